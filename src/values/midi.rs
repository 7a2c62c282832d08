use arrayvec::ArrayVec;

pub const MAX_MIDI_EVENTS: usize = 16;

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MidiEventType {
    NoteOn,
    NoteOff,
    PolyphonicAftertouch,
    ChannelAftertouch,
    PitchWheel,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MidiEvent {
    pub event: MidiEventType,
    pub channel: u8,
    pub note: u8,
    pub param: u8,
    pub time: u32,
}

/// The events received during one sample, plus the gate of the stream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MidiData {
    pub events: ArrayVec<MidiEvent, MAX_MIDI_EVENTS>,
    pub active: bool,
}

impl MidiData {
    /// Queues an event. Returns false when the per-sample queue is full.
    pub fn push(&mut self, event: MidiEvent) -> bool {
        match event.event {
            MidiEventType::NoteOn => self.active = true,
            MidiEventType::NoteOff => self.active = false,
            _ => {}
        }
        self.events.try_push(event).is_ok()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
