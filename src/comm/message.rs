//! Tagged messages exchanged between ranks.
use std::fmt;

use crate::graph::ids::{GlobalId, Rank};

/// Four-field header carried by the labeling and flow-update messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageData {
    pub sender: GlobalId,
    pub receiver: GlobalId,
    pub value: i32,
    pub pass: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Set the label on a node, generated from an outgoing edge.
    SetToLabel(MessageData),
    /// Compute and set the label on a node, generated from a reverse edge;
    /// the receiver holds the flow and performs the `min`.
    ComputeFromLabel(MessageData),
    /// Ring marker: some rank labeled the sink, move to the flow update.
    SinkFound,
    /// Apply a flow delta while walking back-pointers across ranks.
    UpdateFlow(MessageData),
    /// Ring marker: the backtracking walk reached the source.
    SourceFound,
    /// Final answer, sent to rank 0 after the algorithm finishes.
    TotalFlow(i32),
    /// Termination-detection tokens.
    TokenWhite,
    TokenRed,
    /// Rank 0 asks every rank to join an all-reduce over its queue state.
    CheckTermination,
    /// Setup-phase broadcast payload.
    Bootstrap(Vec<u8>),
    /// A packed vertex on its way to its post-partition owner.
    Migrate(Vec<u8>),
}

impl Message {
    pub fn tag(&self) -> Tag {
        match self {
            Message::SetToLabel(_) => Tag::SetToLabel,
            Message::ComputeFromLabel(_) => Tag::ComputeFromLabel,
            Message::SinkFound => Tag::SinkFound,
            Message::UpdateFlow(_) => Tag::UpdateFlow,
            Message::SourceFound => Tag::SourceFound,
            Message::TotalFlow(_) => Tag::TotalFlow,
            Message::TokenWhite => Tag::TokenWhite,
            Message::TokenRed => Tag::TokenRed,
            Message::CheckTermination => Tag::CheckTermination,
            Message::Bootstrap(_) => Tag::Bootstrap,
            Message::Migrate(_) => Tag::Migrate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    SetToLabel,
    ComputeFromLabel,
    SinkFound,
    UpdateFlow,
    SourceFound,
    TotalFlow,
    TokenWhite,
    TokenRed,
    CheckTermination,
    Bootstrap,
    Migrate,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tag::SetToLabel => "SET_TO_LABEL",
            Tag::ComputeFromLabel => "COMPUTE_FROM_LABEL",
            Tag::SinkFound => "SINK_FOUND",
            Tag::UpdateFlow => "UPDATE_FLOW",
            Tag::SourceFound => "SOURCE_FOUND",
            Tag::TotalFlow => "TOTAL_FLOW",
            Tag::TokenWhite => "TOKEN_WHITE",
            Tag::TokenRed => "TOKEN_RED",
            Tag::CheckTermination => "CHECK_TERMINATION",
            Tag::Bootstrap => "BOOTSTRAP",
            Tag::Migrate => "MIGRATE",
        };
        f.write_str(name)
    }
}

/// An inbound message together with its sender.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub src: Rank,
    pub msg: Message,
}
