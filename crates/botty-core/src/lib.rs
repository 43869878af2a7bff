//! # Botty Core
//!
//! Platform-neutral types and ports shared by every Botty crate:
//!
//! - [`Update`]: the inbound event handed to handlers
//! - [`Answer`]: one item of handler output
//! - [`BotClient`]: the outbound transport port
//! - [`DatabaseProvider`] / [`Session`]: the persistence port
//!
//! Nothing here knows how handlers are resolved or dispatched; that lives in
//! `botty-framework`.

pub mod answer;
pub mod client;
pub mod database;
pub mod error;
pub mod message;
pub mod update;

pub use answer::{Answer, AnswerKind, InputFile, ParseMode, Payload, SendOptions};
pub use client::{BotClient, BoxedBotClient};
pub use database::{BoxedDatabaseProvider, DatabaseProvider, Session};
pub use error::{
    BoxError, ChatIdNotFound, ClientError, ClientResult, DatabaseError, DatabaseResult,
};
pub use message::MessageDescriptor;
pub use update::{
    CallbackQuery, ChatId, ChatKind, Command, EditedMessage, EffectiveChat, EffectiveMessage,
    EffectiveUser, MessageId, Update, UserId,
};
