/// Portal lifecycle states
///
/// A portal moves `Pending -> Listing -> Detailing -> Done`, or from
/// `Listing` to `Failed` when its listing pages cannot be walked.
use std::fmt;

/// Represents where a portal is in its crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortalState {
    // ===== Active States =====
    /// Not started yet
    Pending,

    /// Walking the listing pages
    Listing,

    /// Fetching route detail pages
    Detailing,

    // ===== Terminal States =====
    /// Every discovered route was attempted
    Done,

    /// The listing walk failed; no routes were attempted
    Failed,
}

impl PortalState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if the lifecycle allows moving from `self` to `next`
    ///
    /// Terminal states never move again.
    pub fn can_transition_to(&self, next: PortalState) -> bool {
        if self.is_terminal() {
            return false;
        }

        matches!(
            (self, next),
            (Self::Pending, Self::Listing)
                | (Self::Listing, Self::Detailing)
                | (Self::Listing, Self::Failed)
                | (Self::Detailing, Self::Done)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Listing => "listing",
            Self::Detailing => "detailing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PortalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
