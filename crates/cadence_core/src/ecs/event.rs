//! Typed event buffers with per-reader cursors.
//!
//! Each registered event type owns one append-only buffer. Readers never
//! consume events from the buffer; they only advance their own cursor, so any
//! number of systems can see the same event. Once per frame `tick` drops the
//! prefix every tracked reader has already moved past and reports how far it
//! shifted each buffer so cursors can be rebased.

use crate::ecs::RuntimeError;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// Anything that can be pushed as an event.
pub trait Event: 'static + Send + Sync {}

impl<T: 'static + Send + Sync> Event for T {}

/// Dense per-runtime event type id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct EventId(u32);

impl EventId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Declaration of one event type.
#[derive(Clone)]
pub struct EventMeta {
    pub type_id: TypeId,
    pub name: &'static str,
    new_buffer: fn() -> Box<dyn ErasedEventBuffer>,
}

impl EventMeta {
    pub fn of<E: Event>() -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            name: type_name::<E>(),
            new_buffer: new_buffer::<E>,
        }
    }
}

impl fmt::Debug for EventMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventMeta").field("name", &self.name).finish()
    }
}

/// Append-only buffer for one event type.
pub struct EventBuffer<E> {
    events: Vec<E>,
    trimmed: u64,
}

impl<E> EventBuffer<E> {
    fn new() -> Self {
        Self {
            events: Vec::new(),
            trimmed: 0,
        }
    }

    fn push(&mut self, event: E) -> u64 {
        let seq = self.trimmed + self.events.len() as u64;
        self.events.push(event);
        seq
    }

    fn unread(&self, cursor: usize) -> &[E] {
        self.events.get(cursor..).unwrap_or(&[])
    }
}

trait ErasedEventBuffer: Send + Sync {
    fn len(&self) -> usize;
    fn total_pushed(&self) -> u64;
    /// Drop the first `count` events.
    fn trim(&mut self, count: usize);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<E: Event> ErasedEventBuffer for EventBuffer<E> {
    fn len(&self) -> usize {
        self.events.len()
    }

    fn total_pushed(&self) -> u64 {
        self.trimmed + self.events.len() as u64
    }

    fn trim(&mut self, count: usize) {
        let count = count.min(self.events.len());
        self.events.drain(..count);
        self.trimmed += count as u64;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn new_buffer<E: Event>() -> Box<dyn ErasedEventBuffer> {
    Box::new(EventBuffer::<E>::new())
}

/// One reader's position in every event buffer.
///
/// Every cursor starts at the front of its buffer, so a reader that has not
/// read a type yet still holds back trimming of everything pushed for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventCursors {
    offsets: Vec<usize>,
}

impl EventCursors {
    pub fn new(event_types: usize) -> Self {
        Self {
            offsets: vec![0; event_types],
        }
    }

    /// Offset of the next unread event.
    #[inline]
    pub fn get(&self, id: EventId) -> usize {
        self.offsets.get(id.index()).copied().unwrap_or(0)
    }

    fn set(&mut self, id: EventId, offset: usize) {
        if self.offsets.len() <= id.index() {
            self.offsets.resize(id.index() + 1, 0);
        }
        self.offsets[id.index()] = offset;
    }

    /// Shift every cursor back by the amount its buffer was trimmed, floored
    /// at zero.
    pub fn rebase(&mut self, shifts: &[usize]) {
        for (offset, shift) in self.offsets.iter_mut().zip(shifts) {
            *offset = offset.saturating_sub(*shift);
        }
    }
}

/// Registry of event types and their buffers.
#[derive(Default)]
pub struct Events {
    by_type: HashMap<TypeId, EventId>,
    metas: Vec<EventMeta>,
    buffers: Vec<Box<dyn ErasedEventBuffer>>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event type. Idempotent.
    pub fn register<E: Event>(&mut self) -> EventId {
        self.register_meta(EventMeta::of::<E>())
    }

    pub(crate) fn register_meta(&mut self, meta: EventMeta) -> EventId {
        if let Some(&id) = self.by_type.get(&meta.type_id) {
            return id;
        }
        let id = EventId(self.metas.len() as u32);
        tracing::debug!(event = meta.name, "registered event type");
        self.by_type.insert(meta.type_id, id);
        self.buffers.push((meta.new_buffer)());
        self.metas.push(meta);
        id
    }

    pub fn id_of<E: Event>(&self) -> Result<EventId, RuntimeError> {
        self.by_type
            .get(&TypeId::of::<E>())
            .copied()
            .ok_or(RuntimeError::UnknownEvent {
                name: type_name::<E>(),
            })
    }

    /// Number of registered event types.
    pub fn len(&self) -> usize {
        self.metas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }

    /// Append an event, returning its sequence number.
    pub fn push<E: Event>(&mut self, event: E) -> Result<u64, RuntimeError> {
        let id = self.id_of::<E>()?;
        Ok(self.buffer_mut::<E>(id).push(event))
    }

    /// Every event at or after the reader's cursor. Advances the cursor to
    /// the end of the buffer, so reading again right away yields nothing.
    pub fn read<'a, E: Event>(
        &'a self,
        cursors: &mut EventCursors,
    ) -> Result<std::slice::Iter<'a, E>, RuntimeError> {
        let id = self.id_of::<E>()?;
        let buffer = self.buffer::<E>(id);
        let unread = buffer.unread(cursors.get(id));
        cursors.set(id, buffer.events.len());
        Ok(unread.iter())
    }

    /// True when the reader has already seen everything buffered for `E`.
    pub fn no_unread<E: Event>(&self, cursors: &EventCursors) -> Result<bool, RuntimeError> {
        let id = self.id_of::<E>()?;
        Ok(cursors.get(id) >= self.buffers[id.index()].len())
    }

    /// Events currently held for `E`.
    pub fn buffered<E: Event>(&self) -> Result<usize, RuntimeError> {
        let id = self.id_of::<E>()?;
        Ok(self.buffers[id.index()].len())
    }

    /// Events ever pushed for `E`, including trimmed ones.
    pub fn total_pushed<E: Event>(&self) -> Result<u64, RuntimeError> {
        let id = self.id_of::<E>()?;
        Ok(self.buffers[id.index()].total_pushed())
    }

    /// Drop, per event type, the prefix every reader in `readers` has
    /// consumed. With no readers at all every buffer is emptied.
    ///
    /// Returns the number of events dropped from each buffer, indexed by
    /// `EventId`. Callers must rebase every cursor they hold with it, whether
    /// it was passed in or not.
    pub fn tick<'a>(&mut self, readers: impl IntoIterator<Item = &'a EventCursors>) -> Vec<usize> {
        let mut floor: Vec<usize> = self.buffers.iter().map(|buffer| buffer.len()).collect();
        for reader in readers {
            for (idx, min) in floor.iter_mut().enumerate() {
                *min = (*min).min(reader.get(EventId(idx as u32)));
            }
        }

        for (buffer, &shift) in self.buffers.iter_mut().zip(&floor) {
            if shift > 0 {
                buffer.trim(shift);
            }
        }
        tracing::trace!(?floor, "event buffers trimmed");
        floor
    }

    fn buffer<E: Event>(&self, id: EventId) -> &EventBuffer<E> {
        self.buffers[id.index()]
            .as_any()
            .downcast_ref::<EventBuffer<E>>()
            .expect("event buffer type matches its registration")
    }

    fn buffer_mut<E: Event>(&mut self, id: EventId) -> &mut EventBuffer<E> {
        self.buffers[id.index()]
            .as_any_mut()
            .downcast_mut::<EventBuffer<E>>()
            .expect("event buffer type matches its registration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Hit(u32);

    #[derive(Debug)]
    struct Ghost;

    fn events() -> Events {
        let mut events = Events::new();
        events.register::<Hit>();
        events
    }

    #[test]
    fn second_read_is_empty() {
        let mut events = events();
        let mut reader = EventCursors::new(events.len());
        events.push(Hit(1)).unwrap();
        events.push(Hit(2)).unwrap();

        let first: Vec<Hit> = events.read::<Hit>(&mut reader).unwrap().cloned().collect();
        assert_eq!(first, vec![Hit(1), Hit(2)]);
        assert_eq!(events.read::<Hit>(&mut reader).unwrap().count(), 0);
        assert!(events.no_unread::<Hit>(&reader).unwrap());
    }

    #[test]
    fn unknown_types_are_rejected_without_appending() {
        let mut events = events();
        let err = events.push(Ghost).unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownEvent { .. }));
        assert_eq!(events.buffered::<Hit>().unwrap(), 0);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn sequence_numbers_keep_increasing_across_trims() {
        let mut events = events();
        let mut reader = EventCursors::new(events.len());
        assert_eq!(events.push(Hit(0)).unwrap(), 0);
        assert_eq!(events.push(Hit(1)).unwrap(), 1);
        events.read::<Hit>(&mut reader).unwrap().for_each(drop);

        let shifts = events.tick([&reader]);
        reader.rebase(&shifts);
        assert_eq!(shifts, vec![2]);
        assert_eq!(events.push(Hit(2)).unwrap(), 2);
        assert_eq!(events.total_pushed::<Hit>().unwrap(), 3);
    }

    #[test]
    fn trimming_never_passes_the_slowest_reader() {
        let mut events = events();
        let mut fast = EventCursors::new(events.len());
        let mut slow = EventCursors::new(events.len());

        for n in 0..3 {
            events.push(Hit(n)).unwrap();
        }
        assert_eq!(events.read::<Hit>(&mut fast).unwrap().count(), 3);

        let shifts = events.tick([&fast, &slow]);
        assert_eq!(shifts, vec![0]);
        fast.rebase(&shifts);
        slow.rebase(&shifts);

        assert_eq!(events.read::<Hit>(&mut slow).unwrap().count(), 3);
        events.push(Hit(3)).unwrap();

        let shifts = events.tick([&fast, &slow]);
        assert_eq!(shifts, vec![3]);
        fast.rebase(&shifts);
        slow.rebase(&shifts);

        let fresh: Vec<Hit> = events.read::<Hit>(&mut fast).unwrap().cloned().collect();
        assert_eq!(fresh, vec![Hit(3)]);
        let fresh: Vec<Hit> = events.read::<Hit>(&mut slow).unwrap().cloned().collect();
        assert_eq!(fresh, vec![Hit(3)]);
    }

    #[test]
    fn a_reader_that_never_read_keeps_every_event() {
        let mut events = events();
        let mut idle = EventCursors::new(events.len());
        let mut busy = EventCursors::new(events.len());
        events.push(Hit(0)).unwrap();
        events.push(Hit(1)).unwrap();
        events.read::<Hit>(&mut busy).unwrap().for_each(drop);

        for _ in 0..3 {
            let shifts = events.tick([&idle, &busy]);
            assert_eq!(shifts, vec![0]);
            idle.rebase(&shifts);
            busy.rebase(&shifts);
        }
        assert_eq!(events.buffered::<Hit>().unwrap(), 2);

        let late: Vec<Hit> = events.read::<Hit>(&mut idle).unwrap().cloned().collect();
        assert_eq!(late, vec![Hit(0), Hit(1)]);
        assert_eq!(events.tick([&idle, &busy]), vec![2]);
    }

    #[test]
    fn cursors_left_out_of_a_tick_are_floored_at_zero() {
        let mut events = events();
        let mut counted = EventCursors::new(events.len());
        let mut ignored = EventCursors::new(events.len());
        events.push(Hit(0)).unwrap();
        events.read::<Hit>(&mut counted).unwrap().for_each(drop);

        let shifts = events.tick([&counted]);
        counted.rebase(&shifts);
        ignored.rebase(&shifts);
        assert_eq!(counted.get(EventId(0)), 0);
        assert_eq!(ignored.get(EventId(0)), 0);
        assert!(events.no_unread::<Hit>(&ignored).unwrap());
    }
}
