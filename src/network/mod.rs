// src/network/mod.rs
//! Client protocol messages
//!
//! - **msg**: frame container, dispatch table, processing context
//! - **msg_account**, **msg_connect**: account and game server login
//! - **msg_action**, **msg_item**, **msg_talk**, **msg_walk**: in-game requests
//! - **msg_user_info**: character sheet built from the player profile
//! - **string_packer**: length-prefixed string lists

pub mod definitions;
pub mod msg;
pub mod msg_account;
pub mod msg_action;
pub mod msg_connect;
pub mod msg_item;
pub mod msg_talk;
pub mod msg_user_info;
pub mod msg_walk;
pub mod string_packer;

pub use msg::{hex_dump, Message, Msg, ServerContext, DISPATCH};
pub use msg_account::MsgAccount;
pub use msg_action::{ActionType, MsgAction};
pub use msg_connect::{MsgConnect, MsgConnectEx};
pub use msg_item::MsgItem;
pub use msg_talk::{Channel, Color, MsgTalk};
pub use msg_user_info::MsgUserInfo;
pub use msg_walk::MsgWalk;
pub use string_packer::StringPacker;
