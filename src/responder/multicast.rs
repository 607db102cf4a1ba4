//! Built-in multicast-DNS responder
//!
//! [`MulticastResponder`] is a client handle to a small responder running on its
//! own worker thread. The worker owns the mDNS socket, keeps the table of
//! registered records, answers matching queries, and reports asynchronous
//! results (registrations, conflicts, socket failures) on an event channel that
//! [`Responder::process_result`] drains.

use std::{
    io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket},
    sync::{Arc, Mutex, MutexGuard},
    thread,
    time::{Duration, Instant},
};

use flume::{Receiver, RecvTimeoutError, Sender};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::{debug, error, info, warn};
use trust_dns_proto::{
    op::{Message, MessageType, OpCode, Query},
    rr::{
        rdata::{A, CNAME},
        DNSClass, Name, RData, Record, RecordType as DnsType,
    },
    serialize::binary::BinDecodable,
};

use super::{RecordFlags, RecordId, RecordRequest, RecordType, Responder};
use crate::{config::ResponderConfig, error::ResponderError};

/// mDNS multicast group
pub const MDNS_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
/// mDNS port
pub const MDNS_PORT: u16 = 5353;

/// mDNS works entirely within a local network, so it can use larger messages
/// than unicast DNS.
const MDNS_BUFFER_SIZE: usize = 1500;
/// How long the worker waits for a command before polling the socket
const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// Poll interval once nothing is pending and the network has been quiet
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// How long the worker keeps polling fast after a command or packet
const ACTIVE_WINDOW: Duration = Duration::from_secs(1);
/// Delay before the second announcement of a new record
const REANNOUNCE_DELAY: Duration = Duration::from_secs(1);
/// TTL cap for replies to legacy unicast queries
const LEGACY_UNICAST_TTL: u32 = 10;

type SharedSocket = Arc<Mutex<Option<UdpSocket>>>;

enum Command {
    Register {
        request: RecordRequest,
        reply: Sender<Result<RecordId, ResponderError>>,
    },
    Shutdown,
}

/// Asynchronous results queued by the worker
#[derive(Debug, Clone, PartialEq)]
enum ResponderEvent {
    Registered { id: RecordId, name: String },
    Conflict { id: RecordId, name: String },
    Failed(ResponderError),
    Wakeup,
}

/// Client handle to the built-in responder
pub struct MulticastResponder {
    commands: Sender<Command>,
    events_tx: Sender<ResponderEvent>,
    events: Receiver<ResponderEvent>,
    socket: SharedSocket,
    local_addr: SocketAddr,
}

impl MulticastResponder {
    /// Bind the mDNS socket and start the responder worker
    ///
    /// # Errors
    ///
    /// Returns [`ResponderError::ServiceNotRunning`] if the socket cannot be
    /// set up, and [`ResponderError::NoMemory`] if the worker thread cannot be
    /// spawned.
    pub fn open(config: &ResponderConfig) -> Result<Self, ResponderError> {
        let socket = bind_socket(config).map_err(|e| {
            error!("Failed to bind mDNS socket on {}:{}: {}", config.interface, config.port, e);
            ResponderError::ServiceNotRunning
        })?;
        let local_addr = socket.local_addr().map_err(|_| ResponderError::ServiceNotRunning)?;
        let socket = Arc::new(Mutex::new(Some(socket)));

        let (commands, command_rx) = flume::unbounded();
        let (events_tx, events) = flume::unbounded();

        let worker = Worker {
            commands: command_rx,
            events: events_tx.clone(),
            socket: Arc::clone(&socket),
            group: SocketAddr::V4(SocketAddrV4::new(MDNS_GROUP, config.port)),
            table: RecordTable::default(),
            next_id: 0,
            reannounce: Vec::new(),
            active_until: Instant::now(),
        };
        thread::Builder::new()
            .name("bonjour-responder".to_string())
            .spawn(move || worker.run())
            .map_err(|e| {
                error!("Failed to spawn responder worker: {}", e);
                ResponderError::NoMemory
            })?;

        debug!("mDNS responder listening on {}", local_addr);
        Ok(Self {
            commands,
            events_tx,
            events,
            socket,
            local_addr,
        })
    }

    /// Address the responder socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether [`Responder::close_descriptor`] has been called
    pub fn is_closed(&self) -> bool {
        lock(&self.socket).is_none()
    }
}

impl Responder for MulticastResponder {
    fn register_record(&self, request: RecordRequest) -> Result<RecordId, ResponderError> {
        let (reply, reply_rx) = flume::bounded(1);
        self.commands
            .send(Command::Register { request, reply })
            .map_err(|_| ResponderError::ServiceNotRunning)?;
        reply_rx.recv().map_err(|_| ResponderError::ServiceNotRunning)?
    }

    fn process_result(&self) -> Result<(), ResponderError> {
        match self.events.recv() {
            Ok(ResponderEvent::Registered { id, name }) => {
                debug!("Record {} for {} is being announced", id, name);
                Ok(())
            }
            Ok(ResponderEvent::Conflict { id, name }) => {
                warn!("Record {} for {} withdrawn after a name conflict", id, name);
                Err(ResponderError::NameConflict)
            }
            Ok(ResponderEvent::Failed(err)) => Err(err),
            Ok(ResponderEvent::Wakeup) => Ok(()),
            Err(_) => Err(ResponderError::ServiceNotRunning),
        }
    }

    fn close_descriptor(&self) -> Result<(), ResponderError> {
        if lock(&self.socket).take().is_some() {
            debug!("Closed mDNS socket {}", self.local_addr);
        }
        Ok(())
    }

    fn wake(&self) {
        let _ = self.events_tx.send(ResponderEvent::Wakeup);
    }
}

impl Drop for MulticastResponder {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

fn lock(socket: &SharedSocket) -> MutexGuard<'_, Option<UdpSocket>> {
    socket.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn bind_socket(config: &ResponderConfig) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuse_port(true)?;
    socket.bind(&SockAddr::from(SocketAddrV4::new(
        Ipv4Addr::UNSPECIFIED,
        config.port,
    )))?;
    socket.join_multicast_v4(&MDNS_GROUP, &config.interface)?;
    socket.set_multicast_if_v4(&config.interface)?;
    socket.set_multicast_loop_v4(config.multicast_loop)?;
    socket.set_multicast_ttl_v4(255)?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

struct Worker {
    commands: Receiver<Command>,
    events: Sender<ResponderEvent>,
    socket: SharedSocket,
    group: SocketAddr,
    table: RecordTable,
    next_id: u64,
    reannounce: Vec<(Instant, RecordId)>,
    active_until: Instant,
}

impl Worker {
    fn run(mut self) {
        loop {
            match self.commands.recv_timeout(self.poll_interval(Instant::now())) {
                Ok(Command::Register { request, reply }) => {
                    self.active_until = Instant::now() + ACTIVE_WINDOW;
                    let result = self.register(request);
                    let _ = reply.send(result);
                }
                Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
            self.reannounce_due();
            self.drain_socket();
        }

        self.goodbye();
        debug!("mDNS responder worker stopped");
    }

    /// Poll fast while announcements are pending or traffic was seen recently
    fn poll_interval(&self, now: Instant) -> Duration {
        if !self.reannounce.is_empty() || now < self.active_until {
            POLL_INTERVAL
        } else {
            IDLE_POLL_INTERVAL
        }
    }

    fn register(&mut self, request: RecordRequest) -> Result<RecordId, ResponderError> {
        let record = build_record(&request)?;
        let id = RecordId(self.next_id + 1);
        self.table.insert(id, request.flags, record.clone())?;
        self.next_id = id.0;

        self.send(&response(vec![record]), self.group);
        self.reannounce.push((Instant::now() + REANNOUNCE_DELAY, id));
        let _ = self.events.send(ResponderEvent::Registered {
            id,
            name: request.fullname,
        });
        Ok(id)
    }

    fn reannounce_due(&mut self) {
        let now = Instant::now();
        let (due, pending): (Vec<_>, Vec<_>) =
            self.reannounce.drain(..).partition(|(at, _)| *at <= now);
        self.reannounce = pending;

        let records: Vec<Record> = due
            .into_iter()
            .filter_map(|(_, id)| self.table.get(id).cloned())
            .collect();
        if !records.is_empty() {
            self.send(&response(records), self.group);
        }
    }

    fn drain_socket(&mut self) {
        let mut buf = [0u8; MDNS_BUFFER_SIZE];
        loop {
            let received = match lock(&self.socket).as_ref() {
                Some(socket) => socket.recv_from(&mut buf),
                None => return,
            };
            match received {
                Ok((len, src)) => {
                    self.active_until = Instant::now() + ACTIVE_WINDOW;
                    self.handle_packet(&buf[..len], src);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    warn!("Failed to read from mDNS socket: {}", e);
                    let _ = self.events.send(ResponderEvent::Failed(ResponderError::Unknown));
                    return;
                }
            }
        }
    }

    fn handle_packet(&mut self, data: &[u8], src: SocketAddr) {
        let message = match Message::from_vec(data) {
            Ok(message) => message,
            Err(e) => {
                debug!("Ignoring malformed mDNS packet from {}: {}", src, e);
                return;
            }
        };

        match message.message_type() {
            MessageType::Query => {
                if let Some((reply, dest)) = self.reply(&message, src) {
                    self.send(&reply, dest);
                }
            }
            MessageType::Response => {
                for (id, name) in self.table.conflicts(message.answers()) {
                    self.table.remove(id);
                    warn!("{} from {} conflicts with record {}", name, src, id);
                    let _ = self.events.send(ResponderEvent::Conflict {
                        id,
                        name: name.to_string(),
                    });
                }
            }
        }
    }

    /// Response to a query and where it goes, if any of our records match.
    ///
    /// Queries from a port other than 5353 get a legacy unicast reply. Queries
    /// asking only QU questions get the regular response sent back to the
    /// querier, everything else is answered on the group.
    fn reply(&self, query: &Message, src: SocketAddr) -> Option<(Message, SocketAddr)> {
        let answers = self.table.answers(query.queries());
        if answers.is_empty() {
            return None;
        }
        if src.port() != MDNS_PORT {
            Some((legacy_response(query, answers), src))
        } else if query.queries().iter().all(Query::mdns_unicast_response) {
            Some((response(answers), src))
        } else {
            Some((response(answers), self.group))
        }
    }

    fn goodbye(&mut self) {
        let records: Vec<Record> = self
            .table
            .records()
            .map(|record| {
                let mut record = record.clone();
                record.set_ttl(0);
                record
            })
            .collect();
        if !records.is_empty() {
            info!("Withdrawing {} mDNS records", records.len());
            self.send(&response(records), self.group);
        }
    }

    fn send(&self, message: &Message, dest: SocketAddr) {
        let bytes = match message.to_vec() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to encode mDNS response: {}", e);
                return;
            }
        };
        if let Some(socket) = lock(&self.socket).as_ref() {
            if let Err(e) = socket.send_to(&bytes, dest) {
                warn!("Failed to send mDNS response to {}: {}", dest, e);
            }
        }
    }
}

fn response(answers: Vec<Record>) -> Message {
    let mut message = Message::new();
    message
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_authoritative(true)
        .add_answers(answers);
    message
}

fn legacy_response(query: &Message, answers: Vec<Record>) -> Message {
    let answers = answers.into_iter().map(|mut record| {
        record
            .set_ttl(record.ttl().min(LEGACY_UNICAST_TTL))
            .set_mdns_cache_flush(false);
        record
    });
    let mut message = response(Vec::new());
    message
        .set_id(query.id())
        .add_queries(query.queries().iter().cloned())
        .add_answers(answers);
    message
}

fn fqdn(name: &str) -> Result<Name, ResponderError> {
    if name.is_empty() {
        return Err(ResponderError::BadParam);
    }
    let mut name = Name::from_ascii(name).map_err(|_| ResponderError::BadParam)?;
    name.set_fqdn(true);
    Ok(name)
}

/// Turn a client request into the record the worker announces
fn build_record(request: &RecordRequest) -> Result<Record, ResponderError> {
    let name = fqdn(&request.fullname)?;
    let rdata = match request.rrtype {
        RecordType::A => {
            let octets: [u8; 4] = request
                .rdata
                .as_ref()
                .try_into()
                .map_err(|_| ResponderError::BadParam)?;
            RData::A(A(Ipv4Addr::from(octets)))
        }
        RecordType::Cname => {
            let target = Name::from_bytes(&request.rdata).map_err(|_| ResponderError::BadParam)?;
            RData::CNAME(CNAME(target))
        }
    };

    let mut record = Record::from_rdata(name, request.ttl, rdata);
    record
        .set_dns_class(DNSClass::IN)
        .set_mdns_cache_flush(request.flags == RecordFlags::Unique);
    Ok(record)
}

struct OwnedRecord {
    id: RecordId,
    flags: RecordFlags,
    record: Record,
}

/// Records registered through this responder
#[derive(Default)]
struct RecordTable {
    entries: Vec<OwnedRecord>,
}

impl RecordTable {
    fn insert(&mut self, id: RecordId, flags: RecordFlags, record: Record) -> Result<(), ResponderError> {
        let clash = self.entries.iter().any(|entry| {
            entry.record.name() == record.name()
                && entry.record.record_type() == record.record_type()
                && (entry.flags == RecordFlags::Unique || flags == RecordFlags::Unique)
        });
        if clash {
            return Err(ResponderError::NameConflict);
        }
        self.entries.push(OwnedRecord { id, flags, record });
        Ok(())
    }

    fn get(&self, id: RecordId) -> Option<&Record> {
        self.entries.iter().find(|e| e.id == id).map(|e| &e.record)
    }

    fn remove(&mut self, id: RecordId) {
        self.entries.retain(|e| e.id != id);
    }

    fn records(&self) -> impl Iterator<Item = &Record> {
        self.entries.iter().map(|e| &e.record)
    }

    fn answers(&self, queries: &[Query]) -> Vec<Record> {
        self.entries
            .iter()
            .filter(|entry| {
                queries.iter().any(|query| {
                    query.name() == entry.record.name()
                        && (query.query_type() == DnsType::ANY
                            || query.query_type() == entry.record.record_type())
                })
            })
            .map(|entry| entry.record.clone())
            .collect()
    }

    /// Exclusive records another host answers for with different data.
    /// Goodbye packets (TTL 0) never conflict.
    fn conflicts(&self, answers: &[Record]) -> Vec<(RecordId, Name)> {
        self.entries
            .iter()
            .filter(|entry| entry.flags == RecordFlags::Unique)
            .filter(|entry| {
                answers.iter().any(|answer| {
                    answer.ttl() > 0
                        && answer.name() == entry.record.name()
                        && answer.record_type() == entry.record.record_type()
                        && answer.data() != entry.record.data()
                })
            })
            .map(|entry| (entry.id, entry.record.name().clone()))
            .collect()
    }
}
