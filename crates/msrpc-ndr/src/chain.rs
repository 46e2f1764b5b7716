//! Self-referential lists
//!
//! IDL structures of the form `struct node { T value; struct node *next; }`
//! are held as a flat `Vec<T>`. On the wire every node is a unique pointee
//! holding the node body and the `next` referent id; nodes are written and
//! read one at a time through the deferred queue, so chain length does not
//! grow the stack.

use std::cell::RefCell;
use std::rc::Rc;

use crate::{NdrContext, NdrDecode, NdrEncode, NdrReader, NdrWriter, Pointee, Result};

/// Node layout of a [`PointerChain`]
pub trait ChainLink {
    /// Whether the `next` pointer precedes the node body on the wire
    const LINK_FIRST: bool = false;

    /// Node alignment: the wider of the body's alignment and the pointer
    /// width.
    fn node_align(ctx: &NdrContext) -> usize {
        ctx.word_size()
    }
}

/// Singly linked list of `T`, headed by a unique pointer
pub struct PointerChain<T> {
    nodes: Pointee<Vec<T>>,
}

impl<T> PointerChain<T> {
    pub fn new(nodes: Vec<T>) -> Self {
        Self {
            nodes: Pointee::new(nodes),
        }
    }

    pub fn as_slice(&self) -> &[T] {
        self.nodes.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn into_vec(self) -> Vec<T>
    where
        T: Clone,
    {
        match self.nodes.try_unwrap() {
            Ok(nodes) => nodes,
            Err(shared) => shared.get().cloned().unwrap_or_default(),
        }
    }
}

impl<T> Default for PointerChain<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T> From<Vec<T>> for PointerChain<T> {
    fn from(nodes: Vec<T>) -> Self {
        Self::new(nodes)
    }
}

impl<T: Clone> Clone for PointerChain<T> {
    fn clone(&self) -> Self {
        Self::new(self.as_slice().to_vec())
    }
}

impl<T: PartialEq> PartialEq for PointerChain<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for PointerChain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

fn queue_node<T>(w: &mut NdrWriter, nodes: Pointee<Vec<T>>, index: usize, referent_id: u64)
where
    T: ChainLink + NdrEncode + 'static,
{
    w.defer(referent_id, move |w| {
        let Some(node) = nodes.get().and_then(|n| n.get(index)) else {
            return Ok(());
        };
        let align = T::node_align(w.context());
        w.align(align);
        if T::LINK_FIRST {
            write_link(w, &nodes, index)?;
            node.ndr_encode(w)?;
        } else {
            node.ndr_encode(w)?;
            write_link(w, &nodes, index)?;
        }
        w.write_trailing_gap(align);
        Ok(())
    });
}

fn write_link<T>(w: &mut NdrWriter, nodes: &Pointee<Vec<T>>, index: usize) -> Result<()>
where
    T: ChainLink + NdrEncode + 'static,
{
    let next = index + 1;
    let len = nodes.get().map_or(0, Vec::len);
    if next >= len {
        return w.write_referent_id(0);
    }
    let referent_id = w.tracker_mut().allocate();
    w.write_referent_id(referent_id)?;
    queue_node(w, nodes.clone(), next, referent_id);
    Ok(())
}

impl<T: ChainLink + NdrEncode + 'static> NdrEncode for PointerChain<T> {
    fn ndr_encode(&self, w: &mut NdrWriter) -> Result<()> {
        if self.is_empty() {
            return w.write_referent_id(0);
        }
        let referent_id = w.tracker_mut().allocate();
        w.write_referent_id(referent_id)?;
        queue_node(w, self.nodes.clone(), 0, referent_id);
        Ok(())
    }

    fn ndr_align(ctx: &NdrContext) -> usize {
        ctx.word_size()
    }

    fn ndr_prepare(&mut self) -> Result<()> {
        match self.nodes.get_mut() {
            Some(nodes) => nodes.iter_mut().try_for_each(NdrEncode::ndr_prepare),
            None => self.ndr_validate(),
        }
    }

    fn ndr_validate(&self) -> Result<()> {
        self.iter().try_for_each(NdrEncode::ndr_validate)
    }
}

struct ChainDecode<T> {
    head: u64,
    target: Pointee<Vec<T>>,
    decoded: RefCell<Vec<T>>,
}

fn queue_decode<T>(r: &mut NdrReader, state: Rc<ChainDecode<T>>, referent_id: u64)
where
    T: ChainLink + NdrDecode + 'static,
{
    r.defer(referent_id, move |r| {
        let align = T::node_align(r.context());
        r.align(align);
        // The next node is queued where its id sits relative to the body, so
        // it lands in the same queue slot the encoder gave it.
        let (node, next) = if T::LINK_FIRST {
            let next = r.read_referent_id()?;
            if next != 0 {
                queue_decode(r, Rc::clone(&state), next);
            }
            (T::ndr_decode(r)?, next)
        } else {
            let node = T::ndr_decode(r)?;
            let next = r.read_referent_id()?;
            if next != 0 {
                queue_decode(r, Rc::clone(&state), next);
            }
            (node, next)
        };
        r.read_trailing_gap(align);
        state.decoded.borrow_mut().push(node);

        if next == 0 {
            let nodes = state.decoded.take();
            state.target.fill(nodes, state.head)?;
        }
        Ok(())
    });
}

impl<T: ChainLink + NdrDecode + 'static> NdrDecode for PointerChain<T> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let head = r.read_referent_id()?;
        if head == 0 {
            return Ok(Self::default());
        }
        let target = Pointee::pending();
        let state = Rc::new(ChainDecode {
            head,
            target: target.clone(),
            decoded: RefCell::new(Vec::new()),
        });
        queue_decode(r, state, head);
        Ok(Self { nodes: target })
    }

    fn ndr_min_size(ctx: &NdrContext) -> usize {
        ctx.word_size()
    }
}
