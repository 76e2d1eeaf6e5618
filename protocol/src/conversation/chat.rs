//! Chat reconciliation.
//!
//! There is no per-message state machine: the transcript is the state.
//! Inbound operations are applied by uuid and always acknowledged; local
//! operations are written to the transcript as pending and put on the wire.
//! Lost acknowledgements are not retried, so a message can stay pending for
//! the rest of the session.

use tracing::debug;
use uuid::Uuid;

use super::transcript::{redaction, Party};
use super::Env;
use crate::error::ProtocolError;
use crate::packet::{ChatAck, ChatCommand, ChatMsg, Payload};

/// Applies an inbound `chatMsg` and acknowledges it.
pub async fn receive(env: &mut Env<'_>, msg: &ChatMsg) -> Result<(), ProtocolError> {
    let applied = match msg.command {
        ChatCommand::Add => Some(env.log.peer(&msg.uuid, msg.text.clone())),
        ChatCommand::Replace => env.log.rewrite(&msg.uuid, Party::Peer, msg.text.clone()),
        ChatCommand::Delete => env.log.redact(&msg.uuid, Party::Peer),
    };
    if applied.is_none() {
        debug!(uuid = %msg.uuid, cmmd = ?msg.command, "edit for unknown message ignored");
    }

    env.send(Payload::ChatAck(ChatAck {
        uuid: msg.uuid.clone(),
        command: msg.command,
        able: true,
    }))
    .await
}

/// Applies an inbound `chatAck`.
pub fn acknowledged(env: &mut Env<'_>, ack: &ChatAck) {
    if !env.log.acknowledge(&ack.uuid, ack.able) {
        debug!(uuid = %ack.uuid, "ack for unknown message ignored");
    }
}

/// Sends a new chat message. Returns its uuid.
pub async fn say(env: &mut Env<'_>, text: &str) -> Result<String, ProtocolError> {
    let uuid = Uuid::new_v4().to_string();
    env.log.local(&uuid, text);
    env.send(Payload::ChatMsg(ChatMsg {
        uuid: uuid.clone(),
        command: ChatCommand::Add,
        text: text.to_string(),
    }))
    .await?;
    Ok(uuid)
}

/// Replaces the text of the last own message.
pub async fn replace_last(env: &mut Env<'_>, text: &str) -> Result<(), ProtocolError> {
    let Some(uuid) = last_own(env) else {
        return Ok(());
    };
    env.log.rewrite(&uuid, Party::Local, text);
    env.send(Payload::ChatMsg(ChatMsg {
        uuid,
        command: ChatCommand::Replace,
        text: text.to_string(),
    }))
    .await
}

/// Redacts the last own message.
pub async fn delete_last(env: &mut Env<'_>) -> Result<(), ProtocolError> {
    let Some(uuid) = last_own(env) else {
        return Ok(());
    };
    let len = env
        .log
        .find(&uuid)
        .map(|e| e.text.chars().count())
        .unwrap_or(0);
    env.log.redact(&uuid, Party::Local);
    env.send(Payload::ChatMsg(ChatMsg {
        uuid,
        command: ChatCommand::Delete,
        text: redaction(len),
    }))
    .await
}

fn last_own(env: &mut Env<'_>) -> Option<String> {
    let uuid = env.log.last_local_message().and_then(|e| e.uuid.clone());
    if uuid.is_none() {
        env.log.system("No previous message to change");
    }
    uuid
}
