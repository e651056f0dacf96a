//! Channel state machine for one ledger's sync session.
//!
//! This module provides a pure, side-effect-free state machine for the
//! channel lifecycle. It takes events as input and produces a new state plus
//! a list of actions to execute.
//!
//! The actual I/O (connecting, publishing, timers) is performed by
//! sync-client, not by this module.

/// Channel state - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelState {
    /// Transport connecting.
    #[default]
    Wait,
    /// Transport connected, subscribing to the ledger's channel.
    Open,
    /// Subscribed; envelopes can be published.
    Connected,
    /// Closed or failed. Terminal until a reconnect.
    Done,
}

impl ChannelState {
    /// Create a new state machine in the Wait state.
    pub fn new() -> Self {
        Self::Wait
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (sync-client)
    /// is responsible for executing the returned actions, in order.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // From Wait
            (Self::Wait, Event::TransportOpened) => (Self::Open, vec![Action::Subscribe]),
            (Self::Wait, Event::ConnectFailed) => (Self::Done, vec![Action::Disconnect]),

            // From Open
            (Self::Open, Event::Subscribed) => (
                Self::Connected,
                vec![
                    Action::ScheduleBroadcast {
                        delay: BroadcastDelay::Immediate,
                    },
                    Action::SendHello,
                ],
            ),
            (Self::Open, Event::SubscribeFailed) => (Self::Done, vec![Action::Disconnect]),

            // From Connected
            (Self::Connected, Event::BroadcastDue)
            | (Self::Connected, Event::HelloReceived)
            | (Self::Connected, Event::LocalChange) => (
                Self::Connected,
                vec![
                    Action::Broadcast,
                    Action::ScheduleBroadcast {
                        delay: BroadcastDelay::Interval,
                    },
                ],
            ),

            // Any live state can be lost or closed
            (
                Self::Wait | Self::Open | Self::Connected,
                Event::TransportClosed | Event::CloseRequested,
            ) => (
                Self::Done,
                vec![Action::CancelBroadcast, Action::Disconnect],
            ),

            // From Done
            (Self::Done, Event::ReconnectRequested) => (Self::Wait, vec![Action::Connect]),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if envelopes can be published.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if the session has ended.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Wait => "WAIT",
            Self::Open => "OPEN",
            Self::Connected => "CONNECTED",
            Self::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Events that can occur in the channel lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Transport connection succeeded.
    TransportOpened,
    /// Transport connection failed.
    ConnectFailed,
    /// Subscription to the channel was acknowledged.
    Subscribed,
    /// Subscription failed.
    SubscribeFailed,
    /// The transport closed or errored.
    TransportClosed,
    /// The owner closed the session.
    CloseRequested,
    /// The owner asked to reconnect.
    ReconnectRequested,
    /// The pending broadcast timer fired.
    BroadcastDue,
    /// A peer announced itself.
    HelloReceived,
    /// Ledger metadata changed locally.
    LocalChange,
}

/// When the next broadcast should fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastDelay {
    /// Right away.
    Immediate,
    /// After the configured broadcast interval.
    Interval,
}

/// Actions to be executed by the sync-client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Open the transport.
    Connect,
    /// Close the transport.
    Disconnect,
    /// Subscribe to the ledger's channel.
    Subscribe,
    /// Announce this device to peers.
    SendHello,
    /// Publish full state now.
    Broadcast,
    /// (Re)arm the broadcast timer, replacing any pending one.
    ScheduleBroadcast {
        /// Delay before it fires.
        delay: BroadcastDelay,
    },
    /// Drop the pending broadcast timer.
    CancelBroadcast,
}
