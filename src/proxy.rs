//! Records with one relation already resolved.
//!
//! [`Node`] enumerates everything a caller can do with a tree record: read
//! its keys and attributes, ask for dynamic capabilities, and follow its
//! parent or children. Plain [`Model`] records implement it by querying the
//! store for relations. [`WithPreloadedParent`] and [`WithPreloadedChildren`]
//! implement it by answering one relation from a precomputed value and
//! forwarding every other call to the record they wrap.
//!
//! The wrappers also `Deref` to what they wrap, so fields and inherent
//! methods of the record stay reachable through them.

use std::fmt;
use std::mem;
use std::ops::Deref;
use std::slice::Iter;
use std::sync::Arc;

use rusqlite::types::Value;

use crate::error::Result;
use crate::key::Key;
use crate::persist::Store;
use crate::query::RelationQuery;
use crate::schema::{Model, key_at, primary_key_of};

pub const PARENT: &str = "parent";
pub const CHILDREN: &str = "children";

pub trait Node: Clone + fmt::Debug {
    type Record: Model;
    type Parent: Node<Record = Self::Record>;
    type Child: Node<Record = Self::Record>;

    fn record(&self) -> &Self::Record;
    fn key(&self) -> Result<Key>;
    /// The value of the configured parent column, `None` for a root.
    fn parent_key(&self) -> Result<Option<Key>>;
    fn attribute(&self, column: &str) -> Option<Value>;
    fn responds_to(&self, capability: &str) -> bool;
    fn invoke(&self, capability: &str, args: &[Value]) -> Result<Value>;
    fn parent(&self, store: &dyn Store) -> Result<Option<Self::Parent>>;
    fn children(&self, store: &dyn Store) -> Result<Association<Self::Child>>;
}

// Plain records resolve their relations with one query each.
impl<M: Model> Node for M {
    type Record = M;
    type Parent = M;
    type Child = M;

    fn record(&self) -> &M {
        self
    }
    fn key(&self) -> Result<Key> {
        primary_key_of(self, M::table().primary_key())
    }
    fn parent_key(&self) -> Result<Option<Key>> {
        key_at(self, &M::tree().foreign_key)
    }
    fn attribute(&self, column: &str) -> Option<Value> {
        self.value(column)
    }
    fn responds_to(&self, capability: &str) -> bool {
        capability == PARENT
            || capability == CHILDREN
            || M::table().has_column(capability)
            || self.supports(capability)
    }
    fn invoke(&self, capability: &str, args: &[Value]) -> Result<Value> {
        self.call(capability, args)
    }
    fn parent(&self, store: &dyn Store) -> Result<Option<M>> {
        let Some(parent) = self.parent_key()? else {
            return Ok(None);
        };
        let table = M::table();
        let query = RelationQuery::new(&table, table.primary_key(), parent, None)?;
        store.fetch_related(&query)?.first().map(M::hydrate).transpose()
    }
    fn children(&self, store: &dyn Store) -> Result<Association<M>> {
        let table = M::table();
        let tree = M::tree();
        let query = RelationQuery::new(&table, &tree.foreign_key, self.key()?, tree.order.as_deref())?;
        let records = store
            .fetch_related(&query)?
            .iter()
            .map(M::hydrate)
            .collect::<Result<Vec<_>>>()?;
        Ok(Association::from(records))
    }
}

// ------------- Association -------------
// A loaded list of related records. The live children accessor and the
// preloaded one both hand out this type.
pub struct Association<T> {
    records: Arc<[T]>,
}

impl<T> Association<T> {
    pub fn empty() -> Self {
        Self { records: Arc::from(Vec::new()) }
    }
    /// Always true: an association only exists once its records are known.
    pub fn is_loaded(&self) -> bool {
        true
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    pub fn iter(&self) -> Iter<'_, T> {
        self.records.iter()
    }
}

impl<T> Clone for Association<T> {
    fn clone(&self) -> Self {
        Self { records: Arc::clone(&self.records) }
    }
}
impl<T: fmt::Debug> fmt::Debug for Association<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.records.iter()).finish()
    }
}
impl<T> Deref for Association<T> {
    type Target = [T];
    fn deref(&self) -> &[T] {
        &self.records
    }
}
impl<T> From<Vec<T>> for Association<T> {
    fn from(records: Vec<T>) -> Self {
        Self { records: Arc::from(records) }
    }
}
impl<'a, T> IntoIterator for &'a Association<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;
    fn into_iter(self) -> Iter<'a, T> {
        self.records.iter()
    }
}

// ------------- WithPreloadedParent -------------
#[derive(Clone, Debug)]
pub struct WithPreloadedParent<N, P = N> {
    inner: N,
    parent: Option<P>,
}

impl<N, P> WithPreloadedParent<N, P> {
    pub fn new(inner: N, parent: Option<P>) -> Self {
        Self { inner, parent }
    }
    pub fn preloaded_parent(&self) -> &Option<P> {
        &self.parent
    }
    pub fn inner(&self) -> &N {
        &self.inner
    }
    pub fn into_inner(self) -> N {
        self.inner
    }
}

impl<N, P> Deref for WithPreloadedParent<N, P> {
    type Target = N;
    fn deref(&self) -> &N {
        &self.inner
    }
}

impl<N, P> Node for WithPreloadedParent<N, P>
where
    N: Node,
    P: Node<Record = N::Record>,
{
    type Record = N::Record;
    type Parent = P;
    type Child = N::Child;

    fn record(&self) -> &N::Record {
        self.inner.record()
    }
    fn key(&self) -> Result<Key> {
        self.inner.key()
    }
    fn parent_key(&self) -> Result<Option<Key>> {
        self.inner.parent_key()
    }
    fn attribute(&self, column: &str) -> Option<Value> {
        self.inner.attribute(column)
    }
    fn responds_to(&self, capability: &str) -> bool {
        self.inner.responds_to(capability)
    }
    fn invoke(&self, capability: &str, args: &[Value]) -> Result<Value> {
        self.inner.invoke(capability, args)
    }
    fn parent(&self, _store: &dyn Store) -> Result<Option<P>> {
        Ok(self.parent.clone())
    }
    fn children(&self, store: &dyn Store) -> Result<Association<N::Child>> {
        self.inner.children(store)
    }
}

impl<N: Node, P> PartialEq for WithPreloadedParent<N, P>
where
    N::Record: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.inner.record() == other.inner.record()
    }
}

// ------------- WithPreloadedChildren -------------
#[derive(Clone, Debug)]
pub struct WithPreloadedChildren<N, C = N> {
    inner: N,
    children: Association<C>,
}

impl<N, C> WithPreloadedChildren<N, C> {
    pub fn new(inner: N, children: Association<C>) -> Self {
        Self { inner, children }
    }
    pub fn preloaded_children(&self) -> &Association<C> {
        &self.children
    }
    pub fn inner(&self) -> &N {
        &self.inner
    }
    pub fn into_inner(self) -> N {
        self.inner
    }
}

impl<N, C> Deref for WithPreloadedChildren<N, C> {
    type Target = N;
    fn deref(&self) -> &N {
        &self.inner
    }
}

impl<N, C> Node for WithPreloadedChildren<N, C>
where
    N: Node,
    C: Node<Record = N::Record>,
{
    type Record = N::Record;
    type Parent = N::Parent;
    type Child = C;

    fn record(&self) -> &N::Record {
        self.inner.record()
    }
    fn key(&self) -> Result<Key> {
        self.inner.key()
    }
    fn parent_key(&self) -> Result<Option<Key>> {
        self.inner.parent_key()
    }
    fn attribute(&self, column: &str) -> Option<Value> {
        self.inner.attribute(column)
    }
    fn responds_to(&self, capability: &str) -> bool {
        self.inner.responds_to(capability)
    }
    fn invoke(&self, capability: &str, args: &[Value]) -> Result<Value> {
        self.inner.invoke(capability, args)
    }
    fn parent(&self, store: &dyn Store) -> Result<Option<N::Parent>> {
        self.inner.parent(store)
    }
    fn children(&self, _store: &dyn Store) -> Result<Association<C>> {
        Ok(self.children.clone())
    }
}

impl<N: Node, C> PartialEq for WithPreloadedChildren<N, C>
where
    N::Record: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.inner.record() == other.inner.record()
    }
}

// ------------- Ancestor -------------
// One link of an ancestor chain. Its parent is the next link, so the whole
// chain up to the root is walkable without the store.
pub struct Ancestor<M>(Arc<WithPreloadedParent<M, Ancestor<M>>>);

impl<M> Ancestor<M> {
    pub fn new(record: M, parent: Option<Ancestor<M>>) -> Self {
        Self(Arc::new(WithPreloadedParent::new(record, parent)))
    }
}

// Unlinks the chain one link at a time, so dropping a deep chain never
// recurses. Stops at the first link still held elsewhere.
impl<M> Drop for Ancestor<M> {
    fn drop(&mut self) {
        let mut next = Arc::get_mut(&mut self.0).and_then(|link| link.parent.take());
        while let Some(mut ancestor) = next {
            next = Arc::get_mut(&mut ancestor.0).and_then(|link| link.parent.take());
        }
    }
}

// ------------- Subtree -------------
// A record whose children, and their children in turn, are all preloaded.
pub struct Subtree<M>(Arc<WithPreloadedChildren<M, Subtree<M>>>);

impl<M> Subtree<M> {
    pub fn new(record: M, children: Vec<Subtree<M>>) -> Self {
        Self(Arc::new(WithPreloadedChildren::new(record, Association::from(children))))
    }
}

// Detaches every uniquely held level onto an explicit stack before it is
// dropped, so dropping a deep subtree never recurses.
impl<M> Drop for Subtree<M> {
    fn drop(&mut self) {
        let Some(node) = Arc::get_mut(&mut self.0) else {
            return;
        };
        let mut pending = vec![mem::replace(&mut node.children, Association::empty())];
        while let Some(mut children) = pending.pop() {
            let Some(level) = Arc::get_mut(&mut children.records) else {
                continue;
            };
            for child in level.iter_mut() {
                if let Some(inner) = Arc::get_mut(&mut child.0) {
                    pending.push(mem::replace(&mut inner.children, Association::empty()));
                }
            }
        }
    }
}

/// One entry of a descendant listing: a subtree whose parent is also preloaded.
pub type Descendant<M> = WithPreloadedParent<Subtree<M>, Subtree<M>>;

// The two recursive newtypes forward everything to the wrapper they share.
macro_rules! shared_node {
    ($name:ident, $wrapper:ident, parent = $parent:ty, child = $child:ty) => {
        impl<M> Clone for $name<M> {
            fn clone(&self) -> Self {
                Self(Arc::clone(&self.0))
            }
        }
        impl<M: fmt::Debug> fmt::Debug for $name<M> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(&*self.0, f)
            }
        }
        impl<M> Deref for $name<M> {
            type Target = $wrapper<M, $name<M>>;
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
        impl<M: Model + PartialEq> PartialEq for $name<M> {
            fn eq(&self, other: &Self) -> bool {
                self.0.record() == other.0.record()
            }
        }
        impl<M: Model> Node for $name<M> {
            type Record = M;
            type Parent = $parent;
            type Child = $child;

            fn record(&self) -> &M {
                self.0.record()
            }
            fn key(&self) -> Result<Key> {
                self.0.key()
            }
            fn parent_key(&self) -> Result<Option<Key>> {
                self.0.parent_key()
            }
            fn attribute(&self, column: &str) -> Option<Value> {
                self.0.attribute(column)
            }
            fn responds_to(&self, capability: &str) -> bool {
                self.0.responds_to(capability)
            }
            fn invoke(&self, capability: &str, args: &[Value]) -> Result<Value> {
                self.0.invoke(capability, args)
            }
            fn parent(&self, store: &dyn Store) -> Result<Option<$parent>> {
                self.0.parent(store)
            }
            fn children(&self, store: &dyn Store) -> Result<Association<$child>> {
                self.0.children(store)
            }
        }
    };
}

shared_node!(Ancestor, WithPreloadedParent, parent = Ancestor<M>, child = M);
shared_node!(Subtree, WithPreloadedChildren, parent = M, child = Subtree<M>);
