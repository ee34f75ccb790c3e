//! End-to-end sessions: the framer and dispatcher driving a `MemoryStation`
//! built from a layout, with deferred programming replies routed through a
//! `ClientTable`.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use dccex_core::{
    CommandFramer, CompletionKind, Dispatcher, Outcome, ReplyTarget, RingStream, StreamId,
};
use dccex_station::{
    AccessoryCommand, ClientTable, Decoder, MemoryStation, load_layout_from_str,
};

const LAYOUT: &str = r#"{
    "id": "shed",
    "schema_version": "1.0.0",
    "motor_shield": "POLOLU_MOTOR_SHIELD",
    "parser": { "max_locos": 8 },
    "turnouts": [{ "id": 1, "type": "dcc", "address": 5, "subaddress": 2 }],
    "outputs": [{ "id": 4, "pin": 13 }],
    "sensors": [{ "id": 7, "pin": 40, "pullup": true }],
    "decoder": { "cvs": { "1": 3, "8": 145, "29": 6 } }
}"#;

/// Duplex client stream: scripted input, captured output.
#[derive(Default)]
struct Client {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl Client {
    fn send(&mut self, text: &str) {
        self.input.extend(text.bytes());
    }

    fn take_output(&mut self) -> String {
        String::from_utf8(std::mem::take(&mut self.output)).unwrap()
    }
}

impl Read for Client {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.input.pop_front() {
            Some(b) if !buf.is_empty() => {
                buf[0] = b;
                Ok(1)
            }
            Some(b) => {
                self.input.push_front(b);
                Ok(0)
            }
            None => Err(io::ErrorKind::WouldBlock.into()),
        }
    }
}

impl Write for Client {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Session {
    dispatcher: Dispatcher,
    station: MemoryStation,
    framer: CommandFramer,
    client: Client,
}

impl Session {
    fn new() -> Self {
        let layout = load_layout_from_str(LAYOUT).unwrap();
        let framer = CommandFramer::with_config(StreamId(1), &layout.parser);
        Self {
            dispatcher: Dispatcher::new(layout.parser.clone()),
            station: MemoryStation::from_layout(&layout),
            framer,
            client: Client::default(),
        }
    }

    /// Send `text` and poll until the input is drained.
    fn exchange(&mut self, text: &str) -> String {
        self.client.send(text);
        while !self.client.input.is_empty() {
            self.framer
                .poll(&mut self.client, &mut self.dispatcher, &mut self.station)
                .unwrap();
        }
        self.client.take_output()
    }
}

#[test]
fn status_reports_layout() {
    let mut s = Session::new();
    let reply = s.exchange("<s>");
    let lines: Vec<_> = reply.lines().collect();
    assert_eq!(lines[0], "<p0>");
    assert!(lines[1].starts_with("<iDCC-EX V-"), "{reply}");
    assert!(lines[1].contains("/ POLOLU_MOTOR_SHIELD /"), "{reply}");
    assert_eq!(&lines[2..], ["<H 1 0>", "<Y 4 0>", "<q 7>"]);
}

#[test]
fn driving_session() {
    let mut s = Session::new();
    assert_eq!(s.exchange("<1 MAIN>"), "<p1 MAIN>\n");
    assert_eq!(s.exchange("<t 1 3 50 1>"), "<T 1 50 1>\n");
    let loco = s.station.loco(3).unwrap();
    assert_eq!(loco.speed, 51);
    assert!(loco.forward);

    s.exchange("<F 3 0 1>");
    assert!(s.station.loco(3).unwrap().function(0));

    let reply = s.exchange("<c>");
    assert!(reply.starts_with("<c CurrentMAIN 170 C Milli 0 2000 1 1500>\n"), "{reply}");

    assert_eq!(s.exchange("<!>"), "");
    assert_eq!(s.station.loco(3).unwrap().speed, 1);

    assert_eq!(s.exchange("<#>"), "<# 8>\n");
}

#[test]
fn accessories_and_registries() {
    let mut s = Session::new();
    assert_eq!(s.exchange("<T 1 T>"), "<H 1 1>\n");
    assert_eq!(
        s.station.accessories(),
        &[AccessoryCommand {
            address: 5,
            subaddress: 2,
            activate: true
        }]
    );

    assert_eq!(s.exchange("<Z 4 1>"), "<Y 4 1>\n");
    assert_eq!(s.exchange("<Z 9 1>"), "<X>\n");
    assert_eq!(s.exchange("<S -2 3 0>"), "<X>\n");

    assert_eq!(s.exchange("<E>"), "<e 1 1 1>\n");
    assert!(s.station.has_stored_layout());
    assert_eq!(s.exchange("<e>"), "<O>\n");
    assert!(!s.station.has_stored_layout());
}

#[test]
fn sensor_changes_follow_poll() {
    let mut s = Session::new();
    s.station.set_sensor_input(7, true);
    assert_eq!(s.exchange("<#>"), "<# 8>\n<Q 7>\n");
    s.station.set_sensor_input(7, false);
    assert_eq!(s.exchange("<#>"), "<# 8>\n<q 7>\n");
}

#[test]
fn programming_round_trip_to_stream() {
    let mut s = Session::new();
    let mut table = ClientTable::new();
    table.connect(StreamId(1));

    let mut out = Vec::new();
    let mut reply = ReplyTarget::stream(StreamId(1), &mut out);
    let outcome = s
        .dispatcher
        .dispatch(&mut reply, b"R 8 7 2", &mut s.station)
        .unwrap();
    assert_eq!(outcome, Outcome::Deferred(CompletionKind::ReadByte));
    assert!(out.is_empty());

    // A second operation is refused while the first is in flight.
    let mut busy = Vec::new();
    let mut reply = ReplyTarget::stream(StreamId(2), &mut busy);
    s.dispatcher
        .dispatch(&mut reply, b"R 1 0 0", &mut s.station)
        .unwrap();
    assert_eq!(busy, b"<X>\n");

    let (kind, result) = s.station.tick().unwrap();
    s.dispatcher.complete(kind, result, &mut table).unwrap();
    assert_eq!(table.take(StreamId(1)), b"<r7|2|8 145>\n");
    assert!(!s.dispatcher.stash().is_busy());

    s.dispatcher
        .dispatch(&mut ReplyTarget::stream(StreamId(1), &mut out), b"W 1234", &mut s.station)
        .unwrap();
    let (kind, result) = s.station.tick().unwrap();
    s.dispatcher.complete(kind, result, &mut table).unwrap();
    assert_eq!(table.take(StreamId(1)), b"<w 1234>\n");
    assert_eq!(
        s.station.programmer().decoder().unwrap().address(),
        Some(1234)
    );
}

#[test]
fn programming_round_trip_over_ring() {
    let mut s = Session::new();
    let mut table = ClientTable::new();

    let ring = table.ring_mut();
    ring.mark(5);
    assert!(!ring.has_staged());
    let outcome = s
        .dispatcher
        .dispatch(&mut ReplyTarget::ring(&mut *ring), b"R", &mut s.station)
        .unwrap();
    assert_eq!(outcome, Outcome::Deferred(CompletionKind::ReadLocoId));
    ring.commit();

    // Another ring client talks in between.
    ring.mark(6);
    s.dispatcher
        .dispatch(&mut ReplyTarget::ring(&mut *ring), b"#", &mut s.station)
        .unwrap();
    assert!(ring.has_staged());
    ring.commit();
    assert!(!ring.has_staged());

    let (kind, result) = s.station.tick().unwrap();
    s.dispatcher.complete(kind, result, &mut table).unwrap();
    let ring = table.ring_mut();
    assert_eq!(ring.take(5), b"<r 3>\n");
    assert_eq!(ring.take(6), b"<# 8>\n");
}

#[test]
fn disconnected_client_loses_reply() {
    let mut s = Session::new();
    let mut table = ClientTable::new();
    table.connect(StreamId(3));
    let mut out = Vec::new();
    s.dispatcher
        .dispatch(&mut ReplyTarget::stream(StreamId(3), &mut out), b"V 8 145", &mut s.station)
        .unwrap();
    table.disconnect(StreamId(3));

    let (kind, result) = s.station.tick().unwrap();
    s.dispatcher.complete(kind, result, &mut table).unwrap();
    assert!(table.take(StreamId(3)).is_empty());
    assert!(!s.dispatcher.stash().is_busy());
}

#[test]
fn decoder_swapped_between_reads() {
    let mut s = Session::new();
    let mut table = ClientTable::new();
    table.connect(StreamId(1));
    let mut read_id = |s: &mut Session| {
        let mut out = Vec::new();
        s.dispatcher
            .dispatch(&mut ReplyTarget::stream(StreamId(1), &mut out), b"R", &mut s.station)
            .unwrap();
        let (kind, result) = s.station.tick().unwrap();
        s.dispatcher.complete(kind, result, &mut table).unwrap();
        String::from_utf8(table.take(StreamId(1))).unwrap()
    };

    assert_eq!(read_id(&mut s), "<r 3>\n");

    let long = Decoder::new([(17, 0xC4), (18, 0xD2), (29, 0x20)].into_iter().collect());
    s.station.programmer_mut().set_decoder(Some(long));
    assert_eq!(read_id(&mut s), "<r 1234>\n");

    s.station.programmer_mut().set_decoder(None);
    assert_eq!(read_id(&mut s), "<r -1>\n");
}
