//! kseq-state - The feed-time compose matcher.
//!
//! A [`ComposeState`] is one input session's worth of matching state
//! against a compiled [`ComposeTable`]: a cursor into the trie plus the
//! cursor's previous position, which together determine the session
//! status. Sessions are cheap; the table is shared through an `Arc` and
//! never mutated, so any number of sessions can feed concurrently as long
//! as each individual session stays on one thread at a time.
//!
//! Feeding is strictly ordered and never buffers: each accepted keysym
//! either advances the cursor, completes a sequence, or resets it. A
//! keysym that cancels a pending sequence is *not* treated as the start of
//! a new one; callers that want that behavior feed the same keysym again.

use std::sync::Arc;

use kseq_par::{ComposeTable, NodeData};
use kseq_util::keysym::{Keysym, NO_SYMBOL};

/// The status of a compose session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// No sequence is in progress.
    Nothing,
    /// A sequence is in progress.
    Composing,
    /// A sequence just completed; the result is available.
    Composed,
    /// The last keysym aborted a sequence in progress.
    Cancelled,
}

/// Whether a fed keysym participated in matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedResult {
    /// The keysym is transparent to sequences (a modifier, or the
    /// no-symbol sentinel); the state did not change.
    Ignored,
    /// The keysym was matched against the table.
    Accepted,
}

/// One session of compose matching.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use kseq_par::ComposeTable;
/// use kseq_state::{ComposeState, Status};
/// use kseq_util::{Handler, Keysym};
///
/// let handler = Handler::new();
/// let table = ComposeTable::from_buffer(&handler, b"<A> <B> : \"ab\"\n", "C").unwrap();
///
/// let mut state = ComposeState::new(Arc::new(table));
/// state.feed(Keysym::from_char('A'));
/// assert_eq!(state.status(), Status::Composing);
/// state.feed(Keysym::from_char('B'));
/// assert_eq!(state.status(), Status::Composed);
/// assert_eq!(state.utf8(), "ab");
/// ```
pub struct ComposeState {
    table: Arc<ComposeTable>,
    /// Trie offset the cursor was at before the last accepted keysym.
    prev_context: u32,
    /// Trie offset of the current position; 0 when no sequence is live.
    context: u32,
}

impl ComposeState {
    /// Creates a fresh session in [`Status::Nothing`].
    pub fn new(table: Arc<ComposeTable>) -> Self {
        Self {
            table,
            prev_context: 0,
            context: 0,
        }
    }

    /// The table this session matches against.
    pub fn table(&self) -> &Arc<ComposeTable> {
        &self.table
    }

    /// Feeds one keysym to the session.
    ///
    /// Modifier keysyms and the no-symbol sentinel are ignored outright so
    /// that sequences survive the shifting needed to type their members.
    /// Every other keysym is accepted and matched: against the current
    /// node's children while composing, against the top level otherwise.
    pub fn feed(&mut self, keysym: Keysym) -> FeedResult {
        if keysym == NO_SYMBOL || keysym.is_modifier() {
            return FeedResult::Ignored;
        }

        // Starting level: the children of the current node, or the top
        // level when the cursor is parked on a completed (or empty) node.
        let mut context = match self.table.node(self.context).data() {
            NodeData::Internal { successor } => successor,
            NodeData::Leaf { .. } => 0,
        };

        // Linear scan of the sibling chain.
        let mut node = self.table.node(context);
        while node.keysym() != keysym && node.next() != 0 {
            context = node.next();
            node = self.table.node(context);
        }
        if node.keysym() != keysym {
            context = 0;
        }

        self.prev_context = self.context;
        self.context = context;
        FeedResult::Accepted
    }

    /// The session's current status.
    pub fn status(&self) -> Status {
        if self.context == 0 {
            // The cursor fell back to the root: either nothing was in
            // progress, or a live sequence was just cut short.
            if !self.table.node(self.prev_context).is_leaf() {
                Status::Cancelled
            } else {
                Status::Nothing
            }
        } else if self.table.node(self.context).is_leaf() {
            Status::Composed
        } else {
            Status::Composing
        }
    }

    /// The result string of the just-completed sequence.
    ///
    /// Empty unless the status is [`Status::Composed`]. When the sequence
    /// carries no string but its result keysym has a Unicode
    /// interpretation, that character is returned instead.
    pub fn utf8(&self) -> String {
        if self.status() != Status::Composed {
            return String::new();
        }
        match self.table.node(self.context).data() {
            NodeData::Leaf { utf8, keysym } => {
                if utf8 != 0 {
                    self.table.utf8_at(utf8).to_string()
                } else {
                    keysym
                        .to_char()
                        .map(String::from)
                        .unwrap_or_default()
                }
            }
            NodeData::Internal { .. } => String::new(),
        }
    }

    /// The result keysym of the just-completed sequence, or the no-symbol
    /// sentinel in any other status.
    pub fn one_sym(&self) -> Keysym {
        if self.status() != Status::Composed {
            return NO_SYMBOL;
        }
        match self.table.node(self.context).data() {
            NodeData::Leaf { keysym, .. } => keysym,
            NodeData::Internal { .. } => NO_SYMBOL,
        }
    }

    /// Returns the session to [`Status::Nothing`] with the cursor at the
    /// top level.
    pub fn reset(&mut self) {
        self.prev_context = 0;
        self.context = 0;
    }
}
