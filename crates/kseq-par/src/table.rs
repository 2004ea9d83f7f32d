//! The compose table: a packed trie over keysym sequences.
//!
//! Nodes live in one contiguous array and refer to each other by index, so
//! growing the array never invalidates a link. Index 0 holds a reserved
//! empty root node whose keysym field is unused; 0 also serves as the nil
//! link, which works out because nothing ever needs to point *at* the root.
//!
//! Each trie level is a singly linked sibling chain (`next`); an interior
//! node points down at the first node of the following level (`successor`).
//! The chain for the first level starts at the root itself. For
//!
//! ```text
//!     <G> <E>      : "first"
//!     <G> <H> <I>  : "second"
//!     <K> <L>      : "third"
//! ```
//!
//! the array encodes
//!
//! ```text
//!     root → G → K            (sibling chain, level one)
//!            ↓   ↓
//!            E→H L            (E and H are siblings under G)
//!              ↓
//!              I
//! ```
//!
//! A node with no level below it is a leaf and carries its sequence's
//! result: an offset into the UTF-8 arena (0 means no string; the arena
//! starts with an empty string so offset 0 is reserved) and a result
//! keysym (the no-symbol sentinel means none). Since no completed sequence
//! may be a prefix of another, leaves and completed sequences correspond
//! one to one.

use kseq_util::diagnostic::{Handler, Loc};
use kseq_util::keysym::{Keysym, NO_SYMBOL};

use crate::parser::Production;

/// A single trie node.
#[derive(Clone, Copy, Debug)]
pub struct ComposeNode {
    keysym: Keysym,
    /// Offset of the next sibling on this level; 0 ends the chain.
    next: u32,
    data: NodeData,
}

/// The level-below link or the sequence result, depending on whether the
/// node is interior or terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeData {
    /// An interior node: offset of the first node of the next level.
    Internal { successor: u32 },
    /// A terminal node: the result of the sequence ending here.
    Leaf { utf8: u32, keysym: Keysym },
}

impl ComposeNode {
    /// The keysym this node matches.
    #[inline]
    pub fn keysym(&self) -> Keysym {
        self.keysym
    }

    /// Offset of the next sibling, or 0 at the end of the chain.
    #[inline]
    pub fn next(&self) -> u32 {
        self.next
    }

    /// The node's interior/terminal payload.
    #[inline]
    pub fn data(&self) -> NodeData {
        self.data
    }

    /// Returns true if this node terminates a sequence.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.data, NodeData::Leaf { .. })
    }
}

/// A compiled compose table.
///
/// Immutable once compilation finishes; share it across sessions with an
/// `Arc`.
pub struct ComposeTable {
    locale: String,
    /// Concatenated nul-terminated UTF-8 result strings. The first byte is
    /// a nul so that offset 0 always reads as the empty string.
    utf8: Vec<u8>,
    /// The node array. Index 0 is the reserved root.
    nodes: Vec<ComposeNode>,
}

impl ComposeTable {
    pub(crate) fn new(locale: &str) -> Self {
        let root = ComposeNode {
            keysym: NO_SYMBOL,
            next: 0,
            data: NodeData::Leaf {
                utf8: 0,
                keysym: NO_SYMBOL,
            },
        };
        Self {
            locale: locale.to_string(),
            utf8: vec![0],
            nodes: vec![root],
        }
    }

    /// The locale this table was compiled for.
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Returns the node at the given offset.
    ///
    /// # Panics
    ///
    /// Panics if the offset is out of bounds; offsets obtained from the
    /// table itself are always valid.
    #[inline]
    pub fn node(&self, offset: u32) -> &ComposeNode {
        &self.nodes[offset as usize]
    }

    /// Reads the nul-terminated string at the given arena offset.
    pub fn utf8_at(&self, offset: u32) -> &str {
        let start = offset as usize;
        let len = self.utf8[start..]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.utf8.len() - start);
        std::str::from_utf8(&self.utf8[start..start + len]).unwrap_or("")
    }

    /// Number of trie nodes, including the root.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Size of the UTF-8 arena in bytes.
    pub fn utf8_len(&self) -> usize {
        self.utf8.len()
    }

    /// Number of complete sequences in the table.
    pub fn sequence_count(&self) -> usize {
        self.iter().count()
    }

    /// Iterates over all sequences, depth first, in per-level declaration
    /// order.
    pub fn iter(&self) -> Sequences<'_> {
        Sequences {
            table: self,
            stack: Vec::new(),
            started: false,
        }
    }

    /// Appends a fresh leaf node for `keysym` and returns its offset.
    fn add_node(&mut self, keysym: Keysym) -> u32 {
        self.nodes.push(ComposeNode {
            keysym,
            next: 0,
            data: NodeData::Leaf {
                utf8: 0,
                keysym: NO_SYMBOL,
            },
        });
        (self.nodes.len() - 1) as u32
    }

    /// Inserts one production into the trie, resolving conflicts with
    /// earlier productions in favor of the later declaration.
    pub(crate) fn add_production(
        &mut self,
        handler: &Handler,
        loc: &Loc,
        production: &Production,
    ) {
        let mut curr: u32 = 0;

        for (pos, &sym) in production.lhs.iter().enumerate() {
            // Find the sibling matching this keysym, appending one at the
            // end of the chain if there is none.
            while self.nodes[curr as usize].keysym != sym {
                if self.nodes[curr as usize].next == 0 {
                    let next = self.add_node(sym);
                    self.nodes[curr as usize].next = next;
                }
                curr = self.nodes[curr as usize].next;
            }

            if pos + 1 == production.lhs.len() {
                break;
            }

            // Descend, converting a terminal into an interior node if an
            // earlier, shorter sequence ended here.
            let successor = match self.nodes[curr as usize].data {
                NodeData::Internal { successor } => successor,
                NodeData::Leaf { utf8, keysym } => {
                    if utf8 != 0 || keysym != NO_SYMBOL {
                        handler.warning(
                            "a sequence already exists which is a prefix of this \
                             sequence; overriding",
                            loc.clone(),
                        );
                    }
                    let successor = self.add_node(production.lhs[pos + 1]);
                    self.nodes[curr as usize].data =
                        NodeData::Internal { successor };
                    successor
                }
            };
            curr = successor;
        }

        match self.nodes[curr as usize].data {
            NodeData::Internal { .. } => {
                handler.warning(
                    "this compose sequence is a prefix of another; skipping line",
                    loc.clone(),
                );
            }
            NodeData::Leaf { utf8, keysym } => {
                if utf8 != 0 || keysym != NO_SYMBOL {
                    if self.utf8_at(utf8) == production.string
                        && keysym == production.keysym
                    {
                        handler.warning(
                            "this compose sequence is a duplicate of another; \
                             skipping line",
                            loc.clone(),
                        );
                        return;
                    }
                    handler.warning(
                        "this compose sequence already exists; overriding",
                        loc.clone(),
                    );
                }

                let mut new_utf8 = utf8;
                let mut new_keysym = keysym;
                if production.has_string {
                    new_utf8 = self.utf8.len() as u32;
                    self.utf8.extend_from_slice(production.string.as_bytes());
                    self.utf8.push(0);
                }
                if production.has_keysym {
                    new_keysym = production.keysym;
                }
                self.nodes[curr as usize].data = NodeData::Leaf {
                    utf8: new_utf8,
                    keysym: new_keysym,
                };
            }
        }
    }

    /// Releases excess capacity once the table is frozen.
    pub(crate) fn shrink(&mut self) {
        self.nodes.shrink_to_fit();
        self.utf8.shrink_to_fit();
    }
}

/// One complete sequence yielded by [`ComposeTable::iter`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceEntry<'a> {
    /// The left-hand side, in feed order.
    pub keysyms: Vec<Keysym>,
    /// The result string, if the sequence has one.
    pub utf8: Option<&'a str>,
    /// The result keysym, if the sequence has one.
    pub keysym: Option<Keysym>,
}

impl std::fmt::Display for SequenceEntry<'_> {
    /// Renders the sequence in compose-file syntax, parseable back into an
    /// equivalent production.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for sym in &self.keysyms {
            write!(f, "<{}> ", sym.name())?;
        }
        write!(f, ":")?;
        if let Some(string) = self.utf8 {
            write!(f, " \"")?;
            for c in string.chars() {
                match c {
                    '"' => write!(f, "\\\"")?,
                    '\\' => write!(f, "\\\\")?,
                    _ => write!(f, "{}", c)?,
                }
            }
            write!(f, "\"")?;
        }
        if let Some(sym) = self.keysym {
            write!(f, " {}", sym.name())?;
        }
        Ok(())
    }
}

/// Depth-first iterator over a table's sequences.
pub struct Sequences<'a> {
    table: &'a ComposeTable,
    /// Offsets of the nodes on the path to the current leaf.
    stack: Vec<u32>,
    started: bool,
}

impl<'a> Sequences<'a> {
    /// Pushes `offset` and keeps descending through first children until a
    /// leaf is on top of the stack.
    fn descend(&mut self, mut offset: u32) {
        loop {
            self.stack.push(offset);
            match self.table.node(offset).data() {
                NodeData::Internal { successor } => offset = successor,
                NodeData::Leaf { .. } => break,
            }
        }
    }

    fn entry(&self) -> SequenceEntry<'a> {
        let keysyms = self
            .stack
            .iter()
            .map(|&offset| self.table.node(offset).keysym())
            .collect();
        let leaf = self.table.node(*self.stack.last().expect("non-empty path"));
        let (utf8, keysym) = match leaf.data() {
            NodeData::Leaf { utf8, keysym } => (
                (utf8 != 0).then(|| self.table.utf8_at(utf8)),
                (keysym != NO_SYMBOL).then_some(keysym),
            ),
            NodeData::Internal { .. } => (None, None),
        };
        SequenceEntry {
            keysyms,
            utf8,
            keysym,
        }
    }
}

impl<'a> Iterator for Sequences<'a> {
    type Item = SequenceEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            let first = self.table.node(0).next();
            if first == 0 {
                return None;
            }
            self.descend(first);
            return Some(self.entry());
        }

        // Move past the leaf just emitted: to its next sibling, or up and
        // over until an unvisited sibling is found.
        while let Some(offset) = self.stack.pop() {
            let next = self.table.node(offset).next();
            if next != 0 {
                self.descend(next);
                return Some(self.entry());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn loc() -> Loc {
        Loc::new(Arc::from("test"), 1, 1)
    }

    fn production(lhs: &[u32], string: Option<&str>, keysym: Option<u32>) -> Production {
        Production {
            lhs: lhs.iter().map(|&k| Keysym(k)).collect(),
            string: string.unwrap_or("").to_string(),
            keysym: keysym.map(Keysym).unwrap_or(NO_SYMBOL),
            has_string: string.is_some(),
            has_keysym: keysym.is_some(),
        }
    }

    /// Walks the whole trie checking structural invariants.
    fn check_invariants(table: &ComposeTable) {
        let mut pending = vec![0u32];
        while let Some(level_head) = pending.pop() {
            let mut seen = Vec::new();
            let mut offset = level_head;
            loop {
                let node = table.node(offset);
                // No two siblings share a keysym (the root's unused field
                // participates in the first-level chain).
                assert!(
                    !seen.contains(&node.keysym()),
                    "duplicate sibling keysym {:?}",
                    node.keysym()
                );
                seen.push(node.keysym());

                match node.data() {
                    NodeData::Internal { successor } => {
                        // An interior node has at least one child.
                        assert_ne!(successor, 0, "interior node without children");
                        pending.push(successor);
                    }
                    NodeData::Leaf { utf8, keysym } => {
                        if offset != 0 {
                            assert!(
                                utf8 != 0 || keysym != NO_SYMBOL,
                                "leaf with neither string nor keysym"
                            );
                        }
                    }
                }

                offset = node.next();
                if offset == 0 {
                    break;
                }
            }
        }
    }

    #[test]
    fn test_empty_table() {
        let table = ComposeTable::new("C");
        assert_eq!(table.node_count(), 1);
        assert_eq!(table.utf8_len(), 1);
        assert_eq!(table.sequence_count(), 0);
        assert_eq!(table.utf8_at(0), "");
    }

    #[test]
    fn test_single_sequence() {
        let handler = Handler::new();
        let mut table = ComposeTable::new("C");
        table.add_production(&handler, &loc(), &production(&[1, 2], Some("hi"), Some(9)));

        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].keysyms, vec![Keysym(1), Keysym(2)]);
        assert_eq!(entries[0].utf8, Some("hi"));
        assert_eq!(entries[0].keysym, Some(Keysym(9)));
        assert!(handler.diagnostics().is_empty());
        check_invariants(&table);
    }

    #[test]
    fn test_sibling_and_depth_layout() {
        let handler = Handler::new();
        let mut table = ComposeTable::new("C");
        table.add_production(&handler, &loc(), &production(&[1, 2], Some("ab"), None));
        table.add_production(&handler, &loc(), &production(&[1, 3, 4], Some("acd"), None));
        table.add_production(&handler, &loc(), &production(&[5, 6], Some("ef"), None));

        let entries: Vec<_> = table.iter().collect();
        let lhs: Vec<_> = entries.iter().map(|e| e.keysyms.clone()).collect();
        assert_eq!(
            lhs,
            vec![
                vec![Keysym(1), Keysym(2)],
                vec![Keysym(1), Keysym(3), Keysym(4)],
                vec![Keysym(5), Keysym(6)],
            ]
        );
        assert!(handler.diagnostics().is_empty());
        check_invariants(&table);
    }

    #[test]
    fn test_old_prefix_of_new_overrides() {
        let handler = Handler::new();
        let mut table = ComposeTable::new("C");
        table.add_production(&handler, &loc(), &production(&[1, 2], Some("bar"), None));
        table.add_production(&handler, &loc(), &production(&[1, 2, 3], Some("foo"), None));

        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].keysyms.len(), 3);
        assert_eq!(entries[0].utf8, Some("foo"));
        assert_eq!(handler.warning_count(), 1);
        assert!(handler.diagnostics()[0]
            .message
            .contains("a sequence already exists which is a prefix"));
        check_invariants(&table);
    }

    #[test]
    fn test_new_prefix_of_old_is_skipped() {
        let handler = Handler::new();
        let mut table = ComposeTable::new("C");
        table.add_production(&handler, &loc(), &production(&[1, 2, 3], Some("foo"), None));
        table.add_production(&handler, &loc(), &production(&[1, 2], Some("bar"), None));

        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].keysyms.len(), 3);
        assert_eq!(entries[0].utf8, Some("foo"));
        assert_eq!(handler.warning_count(), 1);
        assert!(handler.diagnostics()[0]
            .message
            .contains("is a prefix of another; skipping line"));
        check_invariants(&table);
    }

    #[test]
    fn test_exact_duplicate_is_skipped() {
        let handler = Handler::new();
        let mut table = ComposeTable::new("C");
        let prod = production(&[1, 2], Some("bar"), Some(7));
        table.add_production(&handler, &loc(), &prod);
        let before_len = table.utf8_len();
        table.add_production(&handler, &loc(), &prod);

        assert_eq!(table.sequence_count(), 1);
        // The duplicate's string is not stored again.
        assert_eq!(table.utf8_len(), before_len);
        assert_eq!(handler.warning_count(), 1);
        assert!(handler.diagnostics()[0].message.contains("duplicate"));
        check_invariants(&table);
    }

    #[test]
    fn test_conflicting_result_overrides() {
        let handler = Handler::new();
        let mut table = ComposeTable::new("C");
        table.add_production(&handler, &loc(), &production(&[1, 2], Some("foo"), Some(7)));
        table.add_production(&handler, &loc(), &production(&[1, 2], Some("bar"), Some(8)));

        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].utf8, Some("bar"));
        assert_eq!(entries[0].keysym, Some(Keysym(8)));
        assert_eq!(handler.warning_count(), 1);
        assert!(handler.diagnostics()[0].message.contains("overriding"));
        check_invariants(&table);
    }

    #[test]
    fn test_partial_override_keeps_other_field() {
        let handler = Handler::new();
        let mut table = ComposeTable::new("C");
        table.add_production(&handler, &loc(), &production(&[1, 2], Some("foo"), Some(7)));
        // Keysym-only redeclaration: the stored string survives.
        table.add_production(&handler, &loc(), &production(&[1, 2], None, Some(8)));

        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries[0].utf8, Some("foo"));
        assert_eq!(entries[0].keysym, Some(Keysym(8)));
        check_invariants(&table);
    }

    #[test]
    fn test_arena_is_append_only() {
        let handler = Handler::new();
        let mut table = ComposeTable::new("C");
        table.add_production(&handler, &loc(), &production(&[1], Some("one"), None));
        let offset_one = match table.node(table.node(0).next()).data() {
            NodeData::Leaf { utf8, .. } => utf8,
            NodeData::Internal { .. } => panic!("expected leaf"),
        };
        table.add_production(&handler, &loc(), &production(&[2], Some("two"), None));

        // The first string's offset still reads the same bytes.
        assert_eq!(table.utf8_at(offset_one), "one");
    }
}
