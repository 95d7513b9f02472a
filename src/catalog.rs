//! The declared channel catalog: inputs, outputs and events.
//!
//! A device declares its channels during Synchronisation; the catalog keeps
//! them in three ordered, append-only lists. Append order is the order the
//! declarations arrived and is preserved for the life of the connection —
//! consumers commonly identify an entry by its index, and the dirty queues
//! store indices.

use crate::value::{NumericType, Value};

/// One declared numeric channel (an input or an output).
#[derive(Debug, Clone, PartialEq)]
pub struct NumericValue {
    /// Human-readable channel name, at most `MAX_NAME_LENGTH` bytes.
    pub name: String,
    /// Protocol-level identifier, unique within its list.
    pub channel: u16,
    /// Whether the channel is currently active (toggled by `TNI`).
    pub active: bool,
    /// Declared numeric type.
    pub ty: NumericType,
    /// Current value; starts at numeric zero.
    pub value: Value,
}

impl NumericValue {
    /// A freshly declared channel: active, value zero.
    pub fn new(name: String, channel: u16, ty: NumericType) -> Self {
        Self {
            name,
            channel,
            active: true,
            ty,
            value: Value::zero(ty),
        }
    }
}

/// One declared event channel. Events carry no value; they are
/// fire-and-forget commands from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Protocol-level identifier, unique within the event list.
    pub channel: u16,
    /// Human-readable event name.
    pub name: String,
}

/// Lookup key shared by numeric channels and events.
pub(crate) trait HasChannel {
    fn channel(&self) -> u16;
}

impl HasChannel for NumericValue {
    fn channel(&self) -> u16 {
        self.channel
    }
}

impl HasChannel for Event {
    fn channel(&self) -> u16 {
        self.channel
    }
}

/// Index of the first entry with the given channel number.
pub(crate) fn find_channel<T: HasChannel>(items: &[T], channel: u16) -> Option<usize> {
    items.iter().position(|item| item.channel() == channel)
}

/// The three declaration lists of one endpoint.
#[derive(Debug, Default)]
pub struct Catalog {
    pub(crate) inputs: Vec<NumericValue>,
    pub(crate) outputs: Vec<NumericValue>,
    pub(crate) events: Vec<Event>,
}

impl Catalog {
    /// Declared inputs (host → device values), in declaration order.
    pub fn inputs(&self) -> &[NumericValue] {
        &self.inputs
    }

    /// Declared outputs (device → host values), in declaration order.
    pub fn outputs(&self) -> &[NumericValue] {
        &self.outputs
    }

    /// Declared events, in declaration order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(crate) fn clear(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
        self.events.clear();
    }
}

/// Store `value` into the entry with the given channel and append its index
/// to the dirty queue — but only when the stored value actually differs.
///
/// Returns false when no entry with that channel exists in `values`.
pub(crate) fn set_value_and_enqueue(
    values: &mut [NumericValue],
    channel: u16,
    value: Value,
    queue: &mut Vec<usize>,
) -> bool {
    let Some(index) = find_channel(values, channel) else {
        return false;
    };
    if values[index].value != value {
        values[index].value = value;
        queue.push(index);
    }
    true
}
