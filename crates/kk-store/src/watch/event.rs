use std::fmt;

/// Annotation set on the bookmark that ends the initial event replay.
pub const INITIAL_EVENTS_END_ANNOTATION: &str = "k8s.io/initial-events-end";

/// Discriminant of a [`WatchEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    Added,
    Modified,
    Deleted,
    Bookmark,
    Error,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "ADDED"),
            Self::Modified => write!(f, "MODIFIED"),
            Self::Deleted => write!(f, "DELETED"),
            Self::Bookmark => write!(f, "BOOKMARK"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// One change delivered to a watch consumer.
#[derive(Clone, Debug, PartialEq)]
pub enum WatchEvent<T> {
    Added(T),
    Modified(T),
    /// Last known state of the deleted object.
    Deleted(T),
    /// Progress marker; carries only metadata.
    Bookmark(T),
    /// Terminal error. The channel is closed right after it.
    Error(String),
}

impl<T> WatchEvent<T> {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Added(_) => EventType::Added,
            Self::Modified(_) => EventType::Modified,
            Self::Deleted(_) => EventType::Deleted,
            Self::Bookmark(_) => EventType::Bookmark,
            Self::Error(_) => EventType::Error,
        }
    }

    pub fn object(&self) -> Option<&T> {
        match self {
            Self::Added(obj) | Self::Modified(obj) | Self::Deleted(obj) | Self::Bookmark(obj) => {
                Some(obj)
            }
            Self::Error(_) => None,
        }
    }

    pub fn into_object(self) -> Option<T> {
        match self {
            Self::Added(obj) | Self::Modified(obj) | Self::Deleted(obj) | Self::Bookmark(obj) => {
                Some(obj)
            }
            Self::Error(_) => None,
        }
    }
}
