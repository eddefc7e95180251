use flate2::write::GzEncoder;
use flate2::Compression;
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Mutex;
use tracing::info;

use crate::simulation::events::{
    ActivityEndEvent, ActivityStartEvent, EventTrait, EventsManager, LinkEnterEvent,
    LinkLeaveEvent, OnEventFnBuilder, PersonArrivalEvent, PersonDepartureEvent, StuckAgentEvent,
};

/// Serializes one event into its canonical text line. This text form is the
/// reproducibility contract of the engine: identical input must yield a byte-identical
/// sequence of these lines, so checksums over the serialized stream can be compared
/// across independently built engines.
pub fn event_2_string(e: &dyn EventTrait) -> String {
    if let Some(ev) = e.as_any().downcast_ref::<ActivityStartEvent>() {
        format!(
            "<event time=\"{}\" type=\"{}\" person=\"{}\" link=\"{}\" actType=\"{}\"/>\n",
            ev.time(),
            ev.type_(),
            ev.person,
            ev.link,
            ev.act_type
        )
    } else if let Some(ev) = e.as_any().downcast_ref::<ActivityEndEvent>() {
        format!(
            "<event time=\"{}\" type=\"{}\" person=\"{}\" link=\"{}\" actType=\"{}\"/>\n",
            ev.time(),
            ev.type_(),
            ev.person,
            ev.link,
            ev.act_type
        )
    } else if let Some(ev) = e.as_any().downcast_ref::<PersonDepartureEvent>() {
        format!(
            "<event time=\"{}\" type=\"{}\" person=\"{}\" link=\"{}\" legMode=\"{}\"/>\n",
            ev.time(),
            ev.type_(),
            ev.person,
            ev.link,
            ev.leg_mode
        )
    } else if let Some(ev) = e.as_any().downcast_ref::<LinkEnterEvent>() {
        format!(
            "<event time=\"{}\" type=\"{}\" link=\"{}\" vehicle=\"{}\"/>\n",
            ev.time(),
            ev.type_(),
            ev.link,
            ev.vehicle
        )
    } else if let Some(ev) = e.as_any().downcast_ref::<LinkLeaveEvent>() {
        format!(
            "<event time=\"{}\" type=\"{}\" link=\"{}\" vehicle=\"{}\"/>\n",
            ev.time(),
            ev.type_(),
            ev.link,
            ev.vehicle
        )
    } else if let Some(ev) = e.as_any().downcast_ref::<PersonArrivalEvent>() {
        format!(
            "<event time=\"{}\" type=\"{}\" person=\"{}\" link=\"{}\" legMode=\"{}\"/>\n",
            ev.time(),
            ev.type_(),
            ev.person,
            ev.link,
            ev.leg_mode
        )
    } else if let Some(ev) = e.as_any().downcast_ref::<StuckAgentEvent>() {
        format!(
            "<event time=\"{}\" type=\"{}\" person=\"{}\" link=\"{}\"/>\n",
            ev.time(),
            ev.type_(),
            ev.person,
            ev.link
        )
    } else {
        panic!("Unknown event type {}", e.type_());
    }
}

/// Writes the canonical text stream to a file, gzipped when the path ends in `.gz`.
pub struct TextEventsWriter {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl TextEventsWriter {
    pub fn new(path: PathBuf) -> Self {
        info!("Creating events file: {path:?}");
        let file = File::create(&path).expect("Failed to create events file.");
        let mut writer: Box<dyn Write + Send> =
            if path.extension().is_some_and(|ext| ext == "gz") {
                Box::new(GzEncoder::new(file, Compression::fast()))
            } else {
                Box::new(BufWriter::new(file))
            };
        let header = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<events version=\"1.0\">\n";
        writer
            .write_all(header.as_bytes())
            .expect("Failed to write events file header");
        TextEventsWriter {
            writer: Mutex::new(writer),
        }
    }

    fn write(&self, text: &str) {
        let mut writer = self.writer.lock().expect("Failed to lock events writer");
        writer
            .write_all(text.as_bytes())
            .expect("Error while writing event");
    }

    fn finish(&self) {
        self.write("</events>");
        let mut writer = self.writer.lock().expect("Failed to lock events writer");
        writer.flush().expect("Failed to flush events.");
    }

    pub fn register(path: PathBuf) -> Box<OnEventFnBuilder> {
        Box::new(move |events: &mut EventsManager| {
            let writer = Rc::new(TextEventsWriter::new(path));
            let on_event = writer.clone();
            let on_finish = writer.clone();

            events.on_any(move |_seq, e| on_event.write(&event_2_string(e)));
            events.on_finish(move || on_finish.finish());
        })
    }
}

/// Collects the canonical text lines in memory. Tests and the determinism checks use
/// this to compare whole event streams without touching the file system.
pub struct EventsCollector;

impl EventsCollector {
    /// Subscribes a collector to `events` and returns the shared line buffer.
    pub fn install(events: &mut EventsManager) -> Rc<RefCell<Vec<String>>> {
        let lines: Rc<RefCell<Vec<String>>> = Rc::default();
        let sink = lines.clone();
        events.on_any(move |_seq, e| sink.borrow_mut().push(event_2_string(e)));
        lines
    }
}
