// Copyright (c) 2021 James O. D. Hunt.
//
// SPDX-License-Identifier: Apache-2.0
//

//! Results of a parse: the live [Stream] and the completed [History].

use std::fmt;
use std::iter::FromIterator;
use std::slice;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::debug;

use crate::error::Error;
use crate::parser::{Opt, OptKey};

/// Shared flag used to stop a streaming parse early.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a new (untriggered) token.
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// Ask the worker to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once [CancelToken::cancel()] has been called on any
    /// clone of the token.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A registered option found on the command line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Matched {
    /// The option that was found.
    pub opt: Opt,
    /// Value specified for this option (`getopt(3)`'s `optarg`).
    pub value: Option<String>,
    /// Number of times this option had already been found: `0` for the first
    /// occurrence, `1` for the second and so on. Short and long names of the
    /// same option count together.
    pub occurrence: usize,
}

/// What a [Node] records.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Value {
    /// A registered option.
    Opt(Matched),
    /// A positional argument reported in place
    /// ([crate::Ordering::ReturnInOrder]).
    Arg(String),
    /// A recoverable error.
    Error(Error),
    /// The positional arguments left once scanning finished (always the
    /// last node).
    Args(Vec<String>),
}

/// A single parse result.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Node {
    /// Position of this node in the sequence of results (0-based).
    pub index: usize,
    /// The result.
    pub value: Value,
}

impl Node {
    /// Returns the option details if this node records an option.
    pub fn opt(&self) -> Option<&Matched> {
        match &self.value {
            Value::Opt(matched) => Some(matched),
            _ => None,
        }
    }

    /// Returns the error if this node records one.
    pub fn error(&self) -> Option<&Error> {
        match &self.value {
            Value::Error(err) => Some(err),
            _ => None,
        }
    }
}

/// Parse results delivered as they are produced by the worker thread.
///
/// Dropping the stream stops the worker and waits for it to finish.
pub struct Stream {
    rx: Option<Receiver<Node>>,
    handle: Option<JoinHandle<()>>,
    cancel: CancelToken,
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Stream")
            .field("cancel", &self.cancel)
            .field("running", &self.handle.is_some())
            .finish()
    }
}

impl Stream {
    pub(crate) fn new(rx: Receiver<Node>, handle: JoinHandle<()>, cancel: CancelToken) -> Self {
        Stream {
            rx: Some(rx),
            handle: Some(handle),
            cancel,
        }
    }

    /// Stop the parse. No further nodes are returned.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The token controlling this stream.
    pub fn token(&self) -> &CancelToken {
        &self.cancel
    }
}

impl Iterator for Stream {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        if self.cancel.is_cancelled() {
            return None;
        }

        self.rx.as_ref()?.recv().ok()
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.cancel.cancel();

        // Unblocks a worker waiting on a full channel.
        drop(self.rx.take());

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                debug!("parse worker panicked");
            }
        }
    }
}

/// The completed list of parse results.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct History {
    nodes: Vec<Node>,
}

impl History {
    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if there are no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes, in the order they were produced.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Node at `index`.
    pub fn get(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// The first node.
    pub fn first(&self) -> Option<&Node> {
        self.nodes.first()
    }

    /// The last node.
    pub fn last(&self) -> Option<&Node> {
        self.nodes.last()
    }

    /// Iterate over the nodes.
    pub fn iter(&self) -> slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    /// A cursor positioned on the first node.
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor {
            history: self,
            pos: 0,
        }
    }

    /// All nodes for the option named by `key` (short character or long
    /// name), in the order they were found.
    pub fn lookup(&self, key: impl Into<OptKey>) -> Vec<&Node> {
        let key = key.into();

        self.nodes
            .iter()
            .filter(|n| n.opt().map_or(false, |m| m.opt.matches(&key)))
            .collect()
    }

    /// All positional arguments, whether reported in place or left at the
    /// end.
    pub fn args(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .flat_map(|n| match &n.value {
                Value::Arg(arg) => vec![arg.as_str()],
                Value::Args(args) => args.iter().map(String::as_str).collect(),
                _ => vec![],
            })
            .collect()
    }

    /// All errors, in the order they were found.
    pub fn errors(&self) -> Vec<&Error> {
        self.nodes.iter().filter_map(Node::error).collect()
    }
}

impl FromIterator<Node> for History {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        History {
            nodes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Node;
    type IntoIter = slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// Moves back and forth over a [History].
#[derive(Clone, Copy, Debug)]
pub struct Cursor<'a> {
    history: &'a History,
    pos: usize,
}

#[allow(clippy::should_implement_trait)]
impl<'a> Cursor<'a> {
    /// Current position.
    pub fn index(&self) -> usize {
        self.pos
    }

    /// Node at the current position.
    pub fn node(&self) -> Option<&'a Node> {
        self.history.get(self.pos)
    }

    /// Move forward one node. Returns `None` (without moving) at the end.
    pub fn next(&mut self) -> Option<&'a Node> {
        let node = self.history.get(self.pos + 1)?;
        self.pos += 1;

        Some(node)
    }

    /// Move back one node. Returns `None` (without moving) at the start.
    pub fn prev(&mut self) -> Option<&'a Node> {
        let pos = self.pos.checked_sub(1)?;
        let node = self.history.get(pos)?;
        self.pos = pos;

        Some(node)
    }

    /// Move to the first node.
    pub fn first(&mut self) -> Option<&'a Node> {
        self.pos = 0;

        self.node()
    }

    /// Move to the last node.
    pub fn last(&mut self) -> Option<&'a Node> {
        self.pos = self.history.len().saturating_sub(1);

        self.node()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::parser::Parser;
    use crate::scanner::Settings;
    use crate::table::Need;
    use crate::testing::args;

    fn parser(capacity: usize) -> Parser {
        let mut parser = Parser::new("prog")
            .settings(Settings::new().quiet())
            .capacity(capacity);

        parser.add(Opt::new('n').long("name"));
        parser.add(Opt::new('t').long("time").needs(Need::Argument));

        parser
    }

    fn many(count: usize) -> Vec<String> {
        (0..count).map(|_| "-n".to_string()).collect()
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let clone = token.clone();

        assert!(!token.is_cancelled());
        assert!(!clone.is_cancelled());

        clone.cancel();

        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_stream() {
        for capacity in &[0, 1, 4, 64] {
            let stream = parser(*capacity)
                .parse(args(&["-n", "a", "--time", "37", "-nn"]))
                .unwrap();

            let nodes: Vec<Node> = stream.collect();

            let msg = format!("capacity: {}, nodes: {:?}", capacity, nodes);

            assert_eq!(nodes.len(), 5, "{}", msg);

            let occurrences: Vec<Option<usize>> =
                nodes.iter().map(|n| n.opt().map(|m| m.occurrence)).collect();

            assert_eq!(
                occurrences,
                vec![Some(0), Some(0), Some(1), Some(2), None],
                "{}",
                msg
            );

            assert_eq!(nodes[4].value, Value::Args(args(&["a"])), "{}", msg);
        }
    }

    #[test]
    fn test_occurrences() {
        let history = parser(1).parse_all(args(&["-n", "-n", "-n"])).unwrap();

        let occurrences: Vec<usize> = history
            .lookup('n')
            .iter()
            .filter_map(|n| n.opt())
            .map(|m| m.occurrence)
            .collect();

        assert_eq!(occurrences, vec![0, 1, 2]);
        assert_eq!(history.lookup("name").len(), 3);
        assert!(history.lookup('t').is_empty());
        assert!(history.args().is_empty());
    }

    #[test]
    fn test_history() {
        let history = parser(1)
            .parse_all(args(&["a", "-t", "1", "-f", "b", "--time=2", "-n"]))
            .unwrap();

        assert_eq!(history.len(), 5);
        assert!(!history.is_empty());

        assert_eq!(
            history.first().and_then(|n| n.opt()).map(|m| m.value.clone()),
            Some(Some("1".into()))
        );
        assert_eq!(
            history.last().map(|n| n.value.clone()),
            Some(Value::Args(args(&["a", "b"])))
        );
        assert_eq!(
            history.get(1).and_then(|n| n.error()).map(|e| e.code()),
            Some('f' as i32)
        );
        assert!(history.get(5).is_none());

        let times: Vec<(Option<&str>, usize)> = history
            .lookup("time")
            .iter()
            .filter_map(|n| n.opt())
            .map(|m| (m.value.as_deref(), m.occurrence))
            .collect();

        assert_eq!(times, vec![(Some("1"), 0), (Some("2"), 1)]);

        assert_eq!(history.args(), vec!["a", "b"]);
        assert_eq!(history.errors().len(), 1);

        for (i, node) in (&history).into_iter().enumerate() {
            assert_eq!(node.index, i);
        }

        assert_eq!(History::default().first(), None);
        assert!(History::default().is_empty());
    }

    #[test]
    fn test_in_order_args() {
        let mut parser = Parser::new("prog").settings(Settings::new().quiet());

        parser.add(Opt::new('n'));

        let history = parser.parse_all(args(&["-", "a", "-n", "b"])).unwrap();

        // A lone dash is positional; "-n" is moved in front of it.
        assert_eq!(history.args(), vec!["-", "a", "b"]);

        let mut parser = Parser::new("prog").settings(
            Settings::new()
                .quiet()
                .ordering(crate::scanner::Ordering::ReturnInOrder),
        );

        parser.add(Opt::new('n'));

        let history = parser.parse_all(args(&["a", "-n", "b"])).unwrap();

        assert_eq!(history.args(), vec!["a", "b"]);
        assert_eq!(
            history.get(0).map(|n| n.value.clone()),
            Some(Value::Arg("a".into()))
        );
    }

    #[test]
    fn test_cursor() {
        let history = parser(1)
            .parse_all(args(&["-n", "--time", "37", "effie"]))
            .unwrap();

        let mut cursor = history.cursor();

        assert_eq!(cursor.index(), 0);
        assert_eq!(cursor.node(), history.get(0));
        assert_eq!(cursor.prev(), None);
        assert_eq!(cursor.index(), 0);

        assert_eq!(cursor.next(), history.get(1));
        assert_eq!(cursor.next(), history.get(2));
        assert_eq!(cursor.index(), 2);
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.index(), 2);

        assert_eq!(cursor.prev(), history.get(1));
        assert_eq!(cursor.first(), history.get(0));
        assert_eq!(cursor.last(), history.get(2));
        assert_eq!(cursor.index(), 2);

        let empty = History::default();
        let mut cursor = empty.cursor();

        assert_eq!(cursor.node(), None);
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.prev(), None);
        assert_eq!(cursor.first(), None);
        assert_eq!(cursor.last(), None);
    }

    #[test]
    fn test_cancel() {
        let token = CancelToken::new();

        let mut stream = parser(1)
            .parse_with_cancel(many(10_000), token.clone())
            .unwrap();

        assert!(stream.next().is_some());
        assert!(stream.next().is_some());

        token.cancel();

        assert!(stream.token().is_cancelled());
        assert_eq!(stream.next(), None);
        assert_eq!(stream.next(), None);

        // Joins the worker.
        drop(stream);
    }

    #[test]
    fn test_cancel_via_stream() {
        let mut stream = parser(1).parse(many(10_000)).unwrap();

        let first = stream.next();
        assert_eq!(first.map(|n| n.index), Some(0));

        stream.cancel();

        assert_eq!(stream.next(), None);
    }

    #[test]
    fn test_drop_stops_worker() {
        for capacity in &[0, 1, 8] {
            let mut stream = parser(*capacity).parse(many(10_000)).unwrap();

            assert!(stream.next().is_some());

            let token = stream.token().clone();

            drop(stream);

            assert!(token.is_cancelled(), "capacity: {}", capacity);
        }

        // Never consumed at all.
        let stream = parser(1).parse(many(10_000)).unwrap();
        drop(stream);
    }

    #[test]
    fn test_stream_debug() {
        let stream = parser(1).parse(args(&["-n"])).unwrap();

        let value = format!("{:?}", stream);

        assert!(value.starts_with("Stream {"), "{}", value);
        assert!(value.contains("running: true"), "{}", value);
    }
}
