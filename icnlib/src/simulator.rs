use std::io::BufRead;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::collector::{RunSummary, SummaryCollector};
use crate::config::SimulationConfig;
use crate::error::SimulationError;
use crate::network::NetworkModel;
use crate::strategy::{create_strategy, Event, Strategy};
use crate::topology::Topology;
use crate::trace::TraceReader;
use crate::Time;

/// The simulator feeds requests to the strategy under test, one at a time and in time order, and
/// collects the traffic they generate.
///
/// It supports calling simulate multiple times, and will update the time taken to simulate and the
/// results accordingly
pub struct Simulator {
    network: NetworkModel<SummaryCollector>,
    strategy: Box<dyn Strategy>,
    last_time: Option<Time>,
    events: u64,
    simulation_time: Duration,
}

impl Simulator {
    /// Creates a new simulator for a given configuration
    ///
    /// # Arguments
    ///
    /// * `config`: A simulation configuration, usually resulting from parsing JSON
    ///
    /// returns: Result<Simulator, SimulationError>, failing if the topology is invalid or the
    /// strategy can't be built from its parameters and artifacts
    pub fn new(config: &SimulationConfig) -> Result<Self, SimulationError> {
        let topology = Topology::from_config(&config.topology)?;
        info!(
            nodes = topology.node_count(),
            caches = topology.cache_nodes().len(),
            receivers = topology.receivers().len(),
            policy = ?config.cache_policy,
            "topology loaded"
        );
        let collector = SummaryCollector::new(&topology);
        let network = NetworkModel::with_collector(topology, config.cache_policy, collector);
        let strategy = create_strategy(&config.strategy, &network, config.seed)?;
        Ok(Self::with_strategy(network, strategy))
    }

    /// Creates a simulator around an existing network and strategy
    pub fn with_strategy(network: NetworkModel<SummaryCollector>, strategy: Box<dyn Strategy>) -> Self {
        Self {
            network,
            strategy,
            last_time: None,
            events: 0,
            simulation_time: Duration::new(0, 0),
        }
    }

    /// Processes a single request
    ///
    /// Requests must arrive in non-decreasing time order, an earlier timestamp than the previous
    /// request is rejected before the strategy sees it
    pub fn process(&mut self, event: &Event) -> Result<(), SimulationError> {
        if let Some(previous) = self.last_time {
            if event.time < previous {
                return Err(SimulationError::OutOfOrder {
                    time: event.time,
                    previous,
                });
            }
        }
        self.last_time = Some(event.time);
        self.events += 1;
        self.strategy.process_event(&mut self.network, event)?;
        Ok(())
    }

    /// Replays a sequence of requests
    ///
    /// # Arguments
    ///
    /// * `events`: The requests, in time order
    ///
    /// returns: Result<RunSummary, SimulationError>, the summary of every run so far
    pub fn simulate<I>(&mut self, events: I) -> Result<RunSummary, SimulationError>
    where
        I: IntoIterator<Item = Event>,
    {
        let start = Instant::now();
        let result = events.into_iter().try_for_each(|event| self.process(&event));
        self.simulation_time += start.elapsed();
        result?;
        debug!(events = self.events, "replay finished");
        Ok(self.summary())
    }

    /// Replays a trace read line by line, see [`crate::trace`] for the format
    ///
    /// Reads from the trace are sequential, so a memory mapped reader can be advised accordingly
    pub fn simulate_trace<R: BufRead>(&mut self, reader: R) -> Result<RunSummary, SimulationError> {
        let start = Instant::now();
        let result = TraceReader::new(reader).try_for_each(|event| self.process(&event?));
        self.simulation_time += start.elapsed();
        result?;
        debug!(events = self.events, "trace replay finished");
        Ok(self.summary())
    }

    pub fn summary(&self) -> RunSummary {
        self.network.collector().summary()
    }

    /// Gets the wall-clock execution time for processing
    pub fn get_execution_time(&self) -> &Duration {
        &self.simulation_time
    }

    /// Number of requests processed, warm-up included
    pub fn processed_events(&self) -> u64 {
        self.events
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn network(&self) -> &NetworkModel<SummaryCollector> {
        &self.network
    }
}
