//! Transport-level frames.
//!
//! Sessions read and write [`Frame`]s rather than a concrete WebSocket type,
//! so the same read/write loops run over an axum `WebSocket` in production
//! and over in-memory channels in tests.

use axum::extract::ws;

/// One transport frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame carrying one JSON message.
    Text(String),
    /// Binary frame. Not part of the signaling protocol.
    Binary(Vec<u8>),
    /// Liveness probe.
    Ping(Vec<u8>),
    /// Liveness response.
    Pong(Vec<u8>),
    /// Close handshake.
    Close,
}

impl From<ws::Message> for Frame {
    fn from(message: ws::Message) -> Self {
        match message {
            ws::Message::Text(text) => Frame::Text(text),
            ws::Message::Binary(data) => Frame::Binary(data),
            ws::Message::Ping(data) => Frame::Ping(data),
            ws::Message::Pong(data) => Frame::Pong(data),
            ws::Message::Close(_) => Frame::Close,
        }
    }
}

impl From<Frame> for ws::Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => ws::Message::Text(text),
            Frame::Binary(data) => ws::Message::Binary(data),
            Frame::Ping(data) => ws::Message::Ping(data),
            Frame::Pong(data) => ws::Message::Pong(data),
            Frame::Close => ws::Message::Close(None),
        }
    }
}
