use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::Serialize;
use udcn_core::{FaceId, Packet};
use udcn_forwarder::{
    ContentStore, FaceOutbox, Forwarder, ForwarderCounters, MemoryFace, NextHop, Scheduler,
    Timestamp,
};

use crate::apps::{Consumer, Producer};
use crate::config::{parse_prefix, SimConfig};

#[derive(Debug)]
enum SimEvent {
    ConsumerTick(usize),
    Deliver {
        node: usize,
        face: FaceId,
        packet: Packet,
    },
}

/// One side of a link
struct Port {
    outbox: FaceOutbox,
    peer_node: usize,
    peer_face: FaceId,
    delay: Duration,
}

struct SimNode {
    name: String,
    forwarder: Forwarder,
    ports: Vec<Port>,
}

/// Discrete-event simulation of forwarders joined by delayed links.
///
/// All forwarders share one virtual clock; packets sit in the event queue for
/// the link delay and are processed in deadline order.
pub struct Simulation {
    end: Timestamp,
    scheduler: Scheduler<SimEvent>,
    nodes: Vec<SimNode>,
    consumers: Vec<Consumer>,
    producers: Vec<Producer>,
}

impl Simulation {
    pub fn new(config: &SimConfig) -> Result<Self> {
        let mut nodes = Vec::with_capacity(config.nodes.len());
        let mut index = HashMap::new();
        for node in &config.nodes {
            let forwarder = Forwarder::new(config.forwarder.clone())
                .with_context(|| format!("failed to create forwarder for {}", node.name))?;
            index.insert(node.name.clone(), nodes.len());
            nodes.push(SimNode {
                name: node.name.clone(),
                forwarder,
                ports: Vec::new(),
            });
        }
        let lookup = |name: &str| -> Result<usize> {
            index
                .get(name)
                .copied()
                .ok_or_else(|| anyhow!("unknown node {}", name))
        };

        // (node, neighbour) -> face on node
        let mut link_faces: HashMap<(usize, usize), FaceId> = HashMap::new();
        for link in &config.links {
            let a = lookup(&link.a)?;
            let b = lookup(&link.b)?;
            let delay = Duration::from_millis(link.delay_ms);

            let (face_a, outbox_a) = MemoryFace::new(format!("{}->{}", link.a, link.b), false);
            let (face_b, outbox_b) = MemoryFace::new(format!("{}->{}", link.b, link.a), false);
            let face_a = match &config.nodes[a].address {
                Some(address) => face_a.with_address(address.as_str()),
                None => face_a,
            };
            let face_b = match &config.nodes[b].address {
                Some(address) => face_b.with_address(address.as_str()),
                None => face_b,
            };
            let id_a = nodes[a].forwarder.add_face(Box::new(face_a));
            let id_b = nodes[b].forwarder.add_face(Box::new(face_b));
            nodes[a].ports.push(Port {
                outbox: outbox_a,
                peer_node: b,
                peer_face: id_b,
                delay,
            });
            nodes[b].ports.push(Port {
                outbox: outbox_b,
                peer_node: a,
                peer_face: id_a,
                delay,
            });
            link_faces.entry((a, b)).or_insert(id_a);
            link_faces.entry((b, a)).or_insert(id_b);
            debug!("link {} <-> {} ({}ms)", link.a, link.b, link.delay_ms);
        }

        for route in &config.routes {
            let node = lookup(&route.node)?;
            let next_hop = lookup(&route.next_hop)?;
            let face = *link_faces
                .get(&(node, next_hop))
                .ok_or_else(|| anyhow!("no link from {} to {}", route.node, route.next_hop))?;
            let prefix = parse_prefix(&route.prefix)?;
            let mut next_hop = NextHop::new(face, route.cost);
            next_hop.target_hint = route.target_hint.clone();
            nodes[node].forwarder.fib_mut().add_next_hop(&prefix, next_hop);
        }

        let mut producers = Vec::with_capacity(config.producers.len());
        for producer in &config.producers {
            let node = lookup(&producer.node)?;
            let prefix = parse_prefix(&producer.prefix)?;
            let (face, outbox) = MemoryFace::new(format!("producer {}", prefix), true);
            let face = nodes[node].forwarder.add_face(Box::new(face));
            nodes[node]
                .forwarder
                .fib_mut()
                .add_next_hop(&prefix, NextHop::new(face, 0));
            producers.push(Producer::new(
                node,
                face,
                outbox,
                prefix,
                producer.payload_size,
                producer.freshness_ms.map(Duration::from_millis),
            ));
        }

        let mut scheduler = Scheduler::new();
        let mut consumers = Vec::with_capacity(config.consumers.len());
        for consumer in &config.consumers {
            let node = lookup(&consumer.node)?;
            let prefix = parse_prefix(&consumer.prefix)?;
            let (face, outbox) = MemoryFace::new(format!("consumer {}", prefix), true);
            let face = nodes[node].forwarder.add_face(Box::new(face));
            let start = Timestamp::from_millis(consumer.start_ms);
            scheduler.schedule_at(start, SimEvent::ConsumerTick(consumers.len()));
            consumers.push(Consumer::new(
                node,
                face,
                outbox,
                prefix,
                consumer.interval(),
                Duration::from_millis(consumer.lifetime_ms),
                consumer.must_be_fresh,
                start,
            ));
        }

        Ok(Self {
            end: Timestamp::ZERO + config.duration(),
            scheduler,
            nodes,
            consumers,
            producers,
        })
    }

    /// Run until the configured duration and report what happened
    pub fn run(mut self) -> SimulationReport {
        info!(
            "simulating {} nodes, {} consumers, {} producers until {}",
            self.nodes.len(),
            self.consumers.len(),
            self.producers.len(),
            self.end
        );

        while let Some(next) = self.next_deadline() {
            if next > self.end {
                break;
            }
            self.advance_forwarders(next);
            while let Some((_, event)) = self.scheduler.pop_due(next) {
                self.handle(event, next);
                self.pump(next);
            }
        }

        let end = self.end;
        self.advance_forwarders(end);
        for consumer in &mut self.consumers {
            consumer.expire(end);
        }
        self.report()
    }

    fn next_deadline(&self) -> Option<Timestamp> {
        let mut next = self.scheduler.next_deadline();
        for node in &self.nodes {
            if let Some(deadline) = node.forwarder.next_timer_deadline() {
                next = Some(next.map_or(deadline, |n| n.min(deadline)));
            }
        }
        next
    }

    fn advance_forwarders(&mut self, now: Timestamp) {
        for node in &mut self.nodes {
            node.forwarder.advance_to(now);
        }
        self.scheduler.advance_to(now);
        self.pump(now);
    }

    fn handle(&mut self, event: SimEvent, now: Timestamp) {
        match event {
            SimEvent::ConsumerTick(index) => {
                let Some(consumer) = self.consumers.get_mut(index) else {
                    return;
                };
                consumer.expire(now);
                let interest = consumer.next_interest(now);
                let interval = consumer.interval();
                let (node, face) = (consumer.node, consumer.face);
                self.nodes[node].forwarder.on_incoming_interest(face, interest);
                self.scheduler
                    .schedule_at(now + interval, SimEvent::ConsumerTick(index));
            }
            SimEvent::Deliver { node, face, packet } => {
                let forwarder = &mut self.nodes[node].forwarder;
                match packet {
                    Packet::Interest(interest) => forwarder.on_incoming_interest(face, interest),
                    Packet::Data(data) => forwarder.on_incoming_data(face, data),
                }
            }
        }
    }

    /// Move packets out of every face until nothing more happens at `now`
    fn pump(&mut self, now: Timestamp) {
        loop {
            let mut moved = false;

            for node in &self.nodes {
                for port in &node.ports {
                    for packet in port.outbox.drain() {
                        self.scheduler.schedule_at(
                            now + port.delay,
                            SimEvent::Deliver {
                                node: port.peer_node,
                                face: port.peer_face,
                                packet,
                            },
                        );
                    }
                }
            }

            for consumer in &mut self.consumers {
                for data in consumer.outbox.take_data() {
                    consumer.on_data(&data, now);
                }
            }

            for producer in &mut self.producers {
                for interest in producer.outbox.take_interests() {
                    if let Some(data) = producer.respond(&interest) {
                        self.nodes[producer.node]
                            .forwarder
                            .on_incoming_data(producer.face, data);
                        moved = true;
                    }
                }
            }

            if !moved {
                break;
            }
        }
    }

    fn report(&self) -> SimulationReport {
        SimulationReport {
            duration_ms: self.end.since_start().as_millis() as u64,
            nodes: self
                .nodes
                .iter()
                .map(|node| NodeReport {
                    name: node.name.clone(),
                    counters: node.forwarder.counters().clone(),
                    pit_entries: node.forwarder.pit().len(),
                    cs_entries: node.forwarder.content_store().len(),
                })
                .collect(),
            consumers: self
                .consumers
                .iter()
                .map(|consumer| {
                    let stats = consumer.stats();
                    ConsumerReport {
                        node: self.nodes[consumer.node].name.clone(),
                        prefix: consumer.prefix().to_uri(),
                        start_ms: consumer.start().since_start().as_millis() as u64,
                        sent: stats.sent,
                        satisfied: stats.satisfied,
                        timed_out: stats.timed_out,
                        average_rtt_ms: stats
                            .average_rtt()
                            .map(|rtt| rtt.as_micros() as f64 / 1000.0),
                    }
                })
                .collect(),
            producers: self
                .producers
                .iter()
                .map(|producer| ProducerReport {
                    node: self.nodes[producer.node].name.clone(),
                    prefix: producer.prefix().to_uri(),
                    served: producer.served(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub duration_ms: u64,
    pub nodes: Vec<NodeReport>,
    pub consumers: Vec<ConsumerReport>,
    pub producers: Vec<ProducerReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub name: String,
    pub counters: ForwarderCounters,
    pub pit_entries: usize,
    pub cs_entries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsumerReport {
    pub node: String,
    pub prefix: String,
    pub start_ms: u64,
    pub sent: u64,
    pub satisfied: u64,
    pub timed_out: u64,
    pub average_rtt_ms: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProducerReport {
    pub node: String,
    pub prefix: String,
    pub served: u64,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Simulation Results")?;
        writeln!(f, "==================")?;
        writeln!(f, "Duration: {}ms", self.duration_ms)?;

        writeln!(f)?;
        writeln!(f, "Nodes:")?;
        for node in &self.nodes {
            let c = &node.counters;
            writeln!(
                f,
                "  {:<12} in-int {:>6}  out-int {:>6}  in-data {:>6}  out-data {:>6}  loops {:>4}  cs-hit {:>5.1}%  pit {:>4}  cs {:>4}",
                node.name,
                c.in_interests,
                c.out_interests,
                c.in_data,
                c.out_data,
                c.interest_loops,
                c.cs_hit_ratio() * 100.0,
                node.pit_entries,
                node.cs_entries,
            )?;
        }

        writeln!(f)?;
        writeln!(f, "Consumers:")?;
        for consumer in &self.consumers {
            let rtt = consumer
                .average_rtt_ms
                .map_or_else(|| "-".to_string(), |rtt| format!("{:.1}ms", rtt));
            writeln!(
                f,
                "  {} on {}: sent {}, satisfied {}, timed out {}, avg rtt {}",
                consumer.prefix, consumer.node, consumer.sent, consumer.satisfied, consumer.timed_out, rtt
            )?;
        }

        writeln!(f)?;
        writeln!(f, "Producers:")?;
        for producer in &self.producers {
            writeln!(
                f,
                "  {} on {}: served {}",
                producer.prefix, producer.node, producer.served
            )?;
        }
        Ok(())
    }
}
