//! Event kinds and payloads.
//!
//! Every category of gateway event is a variant of [`EventKind`]; every
//! variant has exactly one payload struct in [`payload`] implementing
//! [`Event`]. The set is closed and enumerable through [`EventKind::ALL`],
//! which is what the handler registry iterates at startup.
//!
//! Payloads travel through the dispatcher as a [`BoxedEvent`], a cheap
//! `Arc`-backed carrier that remembers its kind and can be downcast back to
//! the concrete payload:
//!
//! ```rust,ignore
//! let event = BoxedEvent::new(MemberJoinedEvent { member });
//! assert_eq!(event.kind(), EventKind::MemberJoined);
//! let joined = event.downcast_ref::<MemberJoinedEvent>().unwrap();
//! ```

pub mod model;

use std::any::Any;
use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::UnknownEventKind;

/// A typed event payload.
///
/// Implemented by every struct in [`payload`]; the associated [`KIND`](Event::KIND)
/// ties the payload to its [`EventKind`].
pub trait Event: Any + Debug + Send + Sync {
    /// The kind this payload belongs to.
    const KIND: EventKind;
}

macro_rules! gateway_events {
    (
        $(
            $(#[$kind_meta:meta])*
            $kind:ident => $payload:ident {
                $( $(#[$field_meta:meta])* $field:ident : $ty:ty ),* $(,)?
            }
        )*
    ) => {
        /// Identifies a category of incoming gateway event.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum EventKind {
            $( $(#[$kind_meta])* $kind, )*
        }

        impl EventKind {
            /// Every known event kind, in declaration order.
            pub const ALL: &'static [EventKind] = &[ $( EventKind::$kind, )* ];

            /// Stable name of this kind; also used as the log source for
            /// handler failures.
            pub const fn name(self) -> &'static str {
                match self {
                    $( EventKind::$kind => stringify!($kind), )*
                }
            }
        }

        /// Payload structs, one per [`EventKind`].
        pub mod payload {
            use serde::{Deserialize, Serialize};

            #[allow(unused_imports)]
            use super::model::*;
            use super::{Event, EventKind};

            $(
                #[doc = concat!("Payload of [`EventKind::", stringify!($kind), "`].")]
                #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
                pub struct $payload {
                    $( $(#[$field_meta])* pub $field: $ty, )*
                }

                impl Event for $payload {
                    const KIND: EventKind = EventKind::$kind;
                }
            )*
        }
    };
}

gateway_events! {
    /// The gateway session is ready. Sharded clients raise one per shard.
    Ready => ReadyEvent {
        #[serde(default)]
        shard_id: Option<u32>,
        session_id: String,
        user: UserRef,
    }
    CommandExecuted => CommandExecutedEvent {
        command: String,
        user: UserRef,
        channel_id: Snowflake,
    }
    CommandExecutionFailed => CommandExecutionFailedEvent {
        command: String,
        user: UserRef,
        channel_id: Snowflake,
        reason: String,
    }
    InviteCreated => InviteCreatedEvent {
        code: String,
        channel_id: Snowflake,
        #[serde(default)]
        guild_id: Option<Snowflake>,
    }
    InviteDeleted => InviteDeletedEvent {
        code: String,
        channel_id: Snowflake,
        #[serde(default)]
        guild_id: Option<Snowflake>,
    }
    PresenceUpdated => PresenceUpdatedEvent {
        user: UserRef,
        #[serde(default)]
        activity: Option<Activity>,
    }
    MessageReceived => MessageReceivedEvent {
        message: MessageRef,
    }
    MessageDeleted => MessageDeletedEvent {
        message_id: Snowflake,
        channel_id: Snowflake,
    }
    MessageUpdated => MessageUpdatedEvent {
        message: MessageRef,
    }
    MessagesBulkDeleted => MessagesBulkDeletedEvent {
        message_ids: Vec<Snowflake>,
        channel_id: Snowflake,
    }
    MemberUpdated => MemberUpdatedEvent {
        member: MemberRef,
    }
    MemberBanned => MemberBannedEvent {
        user: UserRef,
        guild: GuildRef,
    }
    /// A user joined a guild.
    MemberJoined => MemberJoinedEvent {
        member: MemberRef,
    }
    /// A user left (or was removed from) a guild.
    MemberLeft => MemberLeftEvent {
        user: UserRef,
        guild: GuildRef,
    }
    MemberUnbanned => MemberUnbannedEvent {
        user: UserRef,
        guild: GuildRef,
    }
    UserUpdated => UserUpdatedEvent {
        user: UserRef,
    }
    ChannelCreated => ChannelCreatedEvent {
        channel_id: Snowflake,
        #[serde(default)]
        guild_id: Option<Snowflake>,
        name: String,
    }
    ChannelDeleted => ChannelDeletedEvent {
        channel_id: Snowflake,
        #[serde(default)]
        guild_id: Option<Snowflake>,
    }
    ChannelUpdated => ChannelUpdatedEvent {
        channel_id: Snowflake,
        #[serde(default)]
        guild_id: Option<Snowflake>,
        name: String,
    }
    ChannelPinsUpdated => ChannelPinsUpdatedEvent {
        channel_id: Snowflake,
    }
    TypingStarted => TypingStartedEvent {
        user_id: Snowflake,
        channel_id: Snowflake,
    }
    VoiceStateUpdated => VoiceStateUpdatedEvent {
        user_id: Snowflake,
        #[serde(default)]
        channel_id: Option<Snowflake>,
    }
    RoleCreated => RoleCreatedEvent {
        role_id: Snowflake,
        guild_id: Snowflake,
        name: String,
    }
    RoleDeleted => RoleDeletedEvent {
        role_id: Snowflake,
        guild_id: Snowflake,
    }
    RoleUpdated => RoleUpdatedEvent {
        role_id: Snowflake,
        guild_id: Snowflake,
        name: String,
    }
    ReactionAdded => ReactionAddedEvent {
        message_id: Snowflake,
        user_id: Snowflake,
        emoji: String,
    }
    ReactionRemoved => ReactionRemovedEvent {
        message_id: Snowflake,
        user_id: Snowflake,
        emoji: String,
    }
    ReactionsCleared => ReactionsClearedEvent {
        message_id: Snowflake,
    }
    EmojiReactionsCleared => EmojiReactionsClearedEvent {
        message_id: Snowflake,
        emoji: String,
    }
    JoinedGuild => JoinedGuildEvent {
        guild: GuildRef,
    }
    LeftGuild => LeftGuildEvent {
        guild: GuildRef,
    }
    GuildUpdated => GuildUpdatedEvent {
        guild: GuildRef,
    }
    GuildEmojisUpdated => GuildEmojisUpdatedEvent {
        guild_id: Snowflake,
        emojis: Vec<String>,
    }
    GuildAvailable => GuildAvailableEvent {
        guild: GuildRef,
    }
    GuildUnavailable => GuildUnavailableEvent {
        guild_id: Snowflake,
    }
    VoiceServerUpdated => VoiceServerUpdatedEvent {
        guild_id: Snowflake,
        endpoint: String,
    }
    WebhooksUpdated => WebhooksUpdatedEvent {
        guild_id: Snowflake,
        channel_id: Snowflake,
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

// ============================================================================
// Boxed Event
// ============================================================================

/// A type-erased event payload tagged with its [`EventKind`].
///
/// Cloning is cheap (one `Arc` increment), which lets the dispatcher move
/// the same event into an offloaded task and into each handler call.
#[derive(Clone)]
pub struct BoxedEvent {
    kind: EventKind,
    inner: Arc<dyn Any + Send + Sync>,
}

impl BoxedEvent {
    /// Wraps a typed payload.
    pub fn new<E: Event>(event: E) -> Self {
        Self {
            kind: E::KIND,
            inner: Arc::new(event),
        }
    }

    /// The kind of the wrapped payload.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Returns `true` if the payload is an `E`.
    pub fn is<E: Event>(&self) -> bool {
        self.inner.is::<E>()
    }

    /// Attempts to borrow the payload as a concrete type.
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.inner.downcast_ref()
    }
}

impl<E: Event> From<E> for BoxedEvent {
    fn from(event: E) -> Self {
        Self::new(event)
    }
}

impl std::fmt::Debug for BoxedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxedEvent")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::model::{GuildRef, MemberRef, UserRef};
    use super::payload::*;
    use super::*;

    fn member() -> MemberRef {
        MemberRef {
            user: UserRef {
                id: 7,
                name: "ferris".into(),
                bot: false,
            },
            guild: GuildRef {
                id: 1,
                name: "rustaceans".into(),
            },
            nick: None,
        }
    }

    #[test]
    fn test_all_kinds_have_unique_names() {
        let mut names: Vec<_> = EventKind::ALL.iter().map(|k| k.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EventKind::ALL.len());
    }

    #[test]
    fn test_kind_parses_from_name() {
        for kind in EventKind::ALL {
            assert_eq!(kind.name().parse::<EventKind>().unwrap(), *kind);
        }
        assert_eq!(
            "memberjoined".parse::<EventKind>().unwrap(),
            EventKind::MemberJoined
        );
        assert!("NotAnEvent".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_boxed_event_downcasts_to_payload() {
        let event = BoxedEvent::new(MemberJoinedEvent { member: member() });

        assert_eq!(event.kind(), EventKind::MemberJoined);
        assert!(event.is::<MemberJoinedEvent>());
        assert!(event.downcast_ref::<MemberLeftEvent>().is_none());
        assert_eq!(
            event.downcast_ref::<MemberJoinedEvent>().unwrap().member.user.name,
            "ferris"
        );
    }

    #[test]
    fn test_payload_decodes_from_gateway_json() {
        let json = r#"{
            "member": {
                "user": { "id": 7, "name": "ferris" },
                "guild": { "id": 1, "name": "rustaceans" }
            }
        }"#;
        let payload: MemberJoinedEvent = serde_json::from_str(json).unwrap();
        assert_eq!(payload, MemberJoinedEvent { member: member() });
    }
}
