//! Generational training loop: mutate, evaluate, accumulate, select.
//!
//! A (μ,λ)-style evolution strategy over kernel stacks. Each iteration
//! clones a random elite (or keeps the identity-initialized working stack
//! while the pool is still empty), perturbs it, scores it stochastically,
//! and records it in the generation buffer. At generation boundaries the
//! highest-fitness candidates become the next elite pool; everything else
//! is discarded. All parents die after reproducing.
//!
//! The loop is single-threaded and cooperatively cancellable: the pause
//! flag is observed once per iteration boundary, never mid-evaluation, so
//! a paused trainer can resume without losing the elite pool or the
//! rolling fitness window.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::schema::{PoolEntry, PoolError, Settings};

use super::buffer::PixelBuffer;
use super::convolve::{RampConfig, apply_stack};
use super::fitness::{Dataset, FitnessEvaluator};
use super::kernel::KernelStack;
use super::mutate::MutationDelta;

/// One evaluated kernel stack with its measured fitness and ancestry
/// label. Immutable once created.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub fitness: f32,
    pub kernels: KernelStack,
    pub lineage: String,
}

impl Candidate {
    /// Convert to a persistable pool entry.
    pub fn to_pool_entry(&self) -> PoolEntry {
        PoolEntry {
            fitness: self.fitness,
            lineage: self.lineage.clone(),
            kernels: self.kernels.layers.iter().map(|k| k.to_rows()).collect(),
        }
    }

    /// Rebuild a candidate from a persisted entry, rejecting non-square or
    /// mixed-size layers.
    pub fn from_pool_entry(entry: PoolEntry) -> Result<Self, PoolError> {
        entry.validate()?;
        let layers = entry
            .kernels
            .iter()
            .map(|rows| super::kernel::Kernel::from_rows(rows))
            .collect();
        Ok(Self {
            fitness: entry.fitness,
            kernels: KernelStack { layers },
            lineage: entry.lineage,
        })
    }
}

/// Receiver for the two images written at each generation boundary. The
/// trainer never performs file I/O itself; sinks log and swallow their own
/// failures so a bad write cannot stall training.
pub trait SnapshotSink {
    /// Called once per selection with the most recent convolution output
    /// and the source image it was produced from.
    fn write_generation(&mut self, output: &PixelBuffer, source: &PixelBuffer);
}

/// Sink that drops all snapshots. Used headless and in tests.
pub struct DiscardSnapshots;

impl SnapshotSink for DiscardSnapshots {
    fn write_generation(&mut self, _output: &PixelBuffer, _source: &PixelBuffer) {}
}

/// Counters and the rolling fitness window for one run.
#[derive(Debug)]
pub struct TrainingState {
    /// Completed iterations.
    pub iterations: u64,
    /// Completed generations.
    pub generations: u64,
    rolling: VecDeque<f32>,
    capacity: usize,
    started: Instant,
}

impl TrainingState {
    fn new(capacity: usize) -> Self {
        Self {
            iterations: 0,
            generations: 0,
            rolling: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            started: Instant::now(),
        }
    }

    /// Push a fitness sample, evicting the oldest once the window is full.
    fn push_fitness(&mut self, fitness: f32) {
        self.rolling.push_back(fitness);
        if self.rolling.len() > self.capacity {
            self.rolling.pop_front();
        }
    }

    /// Mean of the rolling fitness window, or 0 when empty.
    pub fn rolling_average(&self) -> f32 {
        if self.rolling.is_empty() {
            return 0.0;
        }
        self.rolling.iter().sum::<f32>() / self.rolling.len() as f32
    }

    /// Current window occupancy.
    pub fn window_len(&self) -> usize {
        self.rolling.len()
    }

    /// Wall-clock seconds since the state was created.
    pub fn elapsed_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

/// The evolutionary training loop and all state it owns.
pub struct Trainer {
    settings: Settings,
    dataset: Dataset,
    evaluator: FitnessEvaluator,
    working: KernelStack,
    elite: Vec<Candidate>,
    generation: Vec<Candidate>,
    state: TrainingState,
    last_gen_best: f32,
    rng: StdRng,
    paused: Arc<AtomicBool>,
    snapshots: Box<dyn SnapshotSink>,
}

impl Trainer {
    /// Create a trainer with an entropy-seeded RNG.
    pub fn new(settings: Settings, dataset: Dataset, snapshots: Box<dyn SnapshotSink>) -> Self {
        Self::seeded(settings, dataset, snapshots, rand::random())
    }

    /// Create a trainer with a fixed RNG seed (deterministic runs).
    pub fn seeded(
        settings: Settings,
        dataset: Dataset,
        snapshots: Box<dyn SnapshotSink>,
        seed: u64,
    ) -> Self {
        let ramp = RampConfig {
            mid_res: settings.mid_layer_res,
            out_res: settings.out_layer_res,
        };
        let evaluator = FitnessEvaluator::new(ramp, settings.fitness_average_iters);
        let working = KernelStack::identity(settings.nodes_per_layer, settings.node_layers);
        let state = TrainingState::new(settings.overall_fit_iters);

        Self {
            settings,
            dataset,
            evaluator,
            working,
            elite: Vec::new(),
            generation: Vec::new(),
            state,
            last_gen_best: f32::NEG_INFINITY,
            rng: StdRng::seed_from_u64(seed),
            paused: Arc::new(AtomicBool::new(false)),
            snapshots,
        }
    }

    /// Handle for requesting a pause from another thread. The flag is
    /// observed at the next iteration boundary and cleared on observation,
    /// so `run` can simply be called again to resume.
    pub fn pause_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.paused)
    }

    /// Run until a pause is requested. Iterations always complete fully;
    /// elite pool and rolling window survive across pauses.
    pub fn run(&mut self) {
        log::info!(
            "training {} layers of {}x{} kernels over {} image pairs",
            self.settings.node_layers,
            self.settings.nodes_per_layer,
            self.settings.nodes_per_layer,
            self.dataset.len()
        );

        while !self.paused.swap(false, Ordering::Relaxed) {
            self.step();
        }

        log::info!(
            "paused at iteration {} (generation {})",
            self.state.iterations,
            self.state.generations
        );
    }

    /// One full iteration: parent choice, mutation, evaluation, candidate
    /// recording, and (at generation boundaries) selection.
    pub fn step(&mut self) {
        // Working stack: a random elite when the pool is populated,
        // otherwise whatever the loop has accumulated so far (identity at
        // start of run).
        let parent_lineage = if self.elite.is_empty() {
            None
        } else {
            let chosen = self.rng.gen_range(0..self.elite.len());
            self.working = self.elite[chosen].kernels.clone();
            Some(self.elite[chosen].lineage.clone())
        };

        let delta = MutationDelta::sample(&self.working, self.settings.mutation_rate, &mut self.rng);
        self.working.apply(&delta);

        let fitness = self
            .evaluator
            .test_batch(&self.dataset, &self.working, &mut self.rng);

        let lineage = self.lineage_label(parent_lineage);
        self.generation.push(Candidate {
            fitness,
            kernels: self.working.clone(),
            lineage,
        });

        self.state.push_fitness(fitness);

        let cpg = self.settings.children_per_gen;
        if self.state.iterations % cpg == cpg - 1 {
            self.select();
        }

        if self.state.iterations % 2 == 0 {
            self.log_status(fitness);
        }

        self.state.iterations += 1;
    }

    /// Ancestry label: generation 0 uses the bare iteration index; later
    /// generations append the within-generation offset to the parent's
    /// label, growing an append-only trail.
    fn lineage_label(&self, parent_lineage: Option<String>) -> String {
        if self.state.generations == 0 {
            return self.state.iterations.to_string();
        }
        let offset = self.state.iterations - self.state.generations * self.settings.children_per_gen;
        match parent_lineage {
            Some(parent) => format!("{} {}", parent, offset),
            None => offset.to_string(),
        }
    }

    /// Generation boundary: sort the buffer by fitness, promote the
    /// highest tail to the new elite pool, discard the rest, and emit the
    /// progress snapshot. The previous pool is replaced only after the new
    /// one is fully built.
    fn select(&mut self) {
        self.generation
            .sort_by(|a, b| a.fitness.total_cmp(&b.fitness));

        // Sorted ascending, so the tail is the generation's best; keep it
        // for status output after the buffer is cleared.
        if let Some(best) = self.generation.last() {
            self.last_gen_best = best.fitness;
        }

        let take = self
            .settings
            .parents_per_generation
            .min(self.generation.len());
        let mut next = Vec::with_capacity(take);
        for i in 0..take {
            next.push(self.generation[self.generation.len() - 1 - i].clone());
        }

        self.elite = next;
        self.generation.clear();

        if let Some(output) = self.evaluator.last_output() {
            self.snapshots
                .write_generation(output, self.dataset.source(self.evaluator.last_index()));
        }

        self.state.generations += 1;
    }

    /// Best fitness of the generation in progress, or of the generation
    /// that just completed when selection has emptied the buffer.
    fn generation_best(&self) -> f32 {
        if self.generation.is_empty() {
            self.last_gen_best
        } else {
            self.generation
                .iter()
                .map(|c| c.fitness)
                .fold(f32::NEG_INFINITY, f32::max)
        }
    }

    fn log_status(&self, fitness: f32) {
        let gen_best = self.generation_best();

        log::info!(
            "[{}s] iter {} gen {}: fitness {:.0}, rolling {:.0}, gen best {:.0}",
            self.state.elapsed_secs(),
            self.state.iterations,
            self.state.generations,
            fitness,
            self.state.rolling_average(),
            if gen_best.is_finite() { gen_best } else { fitness },
        );
        for parent in &self.elite {
            let tail = &parent.lineage[parent.lineage.len().saturating_sub(20)..];
            log::debug!("parent ..{} fitness {:.0}", tail, parent.fitness);
        }
    }

    /// One-shot anneal: perturb the working stack at an operator-chosen
    /// rate, outside the main loop. Same delta contract as `step`.
    pub fn anneal(&mut self, rate: f32) {
        let delta = MutationDelta::sample(&self.working, rate, &mut self.rng);
        self.working.apply(&delta);
    }

    /// Apply the current working stack to an arbitrary image.
    pub fn apply_current(&self, source: &PixelBuffer) -> PixelBuffer {
        let ramp = RampConfig {
            mid_res: self.settings.mid_layer_res,
            out_res: self.settings.out_layer_res,
        };
        apply_stack(source, &self.working, &ramp)
    }

    /// Reset the working stack to the identity pipeline.
    pub fn reset_kernels(&mut self) {
        self.working =
            KernelStack::identity(self.settings.nodes_per_layer, self.settings.node_layers);
    }

    /// Replace the elite pool, e.g. from a persisted pool file.
    ///
    /// All stacks in one run share the configured layer count and kernel
    /// size, so candidates saved under a different shape cannot join this
    /// run: they are skipped with their index logged.
    pub fn set_elite(&mut self, elite: Vec<Candidate>) {
        let layers = self.settings.node_layers;
        let size = self.settings.nodes_per_layer;

        self.elite = elite
            .into_iter()
            .enumerate()
            .filter_map(|(index, candidate)| {
                let fits = candidate.kernels.len() == layers
                    && candidate.kernels.layers.iter().all(|k| k.size == size);
                if fits {
                    Some(candidate)
                } else {
                    log::warn!(
                        "skipping candidate {}: kernel shape does not match {} layers of {}x{}",
                        index,
                        layers,
                        size,
                        size
                    );
                    None
                }
            })
            .collect();
    }

    /// Change the mutation rate for subsequent iterations.
    pub fn set_mutation_rate(&mut self, rate: f32) {
        self.settings.mutation_rate = rate;
    }

    /// Current elite pool, ordered best-first.
    pub fn elite(&self) -> &[Candidate] {
        &self.elite
    }

    /// The working kernel stack.
    pub fn kernels(&self) -> &KernelStack {
        &self.working
    }

    /// Counters and rolling window.
    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    /// Active settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(width: usize, value: f32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(width, width, 3);
        buf.data.fill(value);
        buf
    }

    fn tiny_settings(children: u64, parents: usize) -> Settings {
        Settings {
            node_layers: 2,
            nodes_per_layer: 3,
            fitness_average_iters: 2,
            mutation_rate: 0.0,
            children_per_gen: children,
            overall_fit_iters: 5,
            mid_layer_res: 4,
            out_layer_res: 4,
            parents_per_generation: parents,
            ..Settings::default()
        }
    }

    fn tiny_dataset() -> Dataset {
        Dataset::new(vec![flat(4, 10.0)], vec![flat(4, 12.0)]).unwrap()
    }

    fn tiny_trainer(children: u64, parents: usize) -> Trainer {
        Trainer::seeded(
            tiny_settings(children, parents),
            tiny_dataset(),
            Box::new(DiscardSnapshots),
            99,
        )
    }

    #[test]
    fn test_zero_mutation_generation() {
        // With mutation disabled every candidate is the identity stack, so
        // all four share one fitness: -(4*4*3 * 2) = -96.
        let mut trainer = tiny_trainer(4, 2);
        for _ in 0..4 {
            trainer.step();
        }

        assert_eq!(trainer.state().iterations, 4);
        assert_eq!(trainer.state().generations, 1);
        assert_eq!(trainer.elite().len(), 2);
        for parent in trainer.elite() {
            assert!((parent.fitness - -96.0).abs() < 1e-3);
        }
        assert!(trainer.generation.is_empty());
    }

    #[test]
    fn test_selection_keeps_highest_tail() {
        let mut trainer = tiny_trainer(4, 2);
        let stack = KernelStack::identity(3, 2);
        for (i, fitness) in [-4.0f32, -1.0, -3.0, -2.0].into_iter().enumerate() {
            trainer.generation.push(Candidate {
                fitness,
                kernels: stack.clone(),
                lineage: i.to_string(),
            });
        }

        trainer.select();

        let fits: Vec<f32> = trainer.elite().iter().map(|c| c.fitness).collect();
        assert_eq!(fits, vec![-1.0, -2.0]);
        assert!(trainer.generation.is_empty());
        assert_eq!(trainer.state().generations, 1);
    }

    #[test]
    fn test_selection_caps_at_buffer_size() {
        // parentsPerGeneration larger than the generation: elite gets
        // min(parents, children) members.
        let mut trainer = tiny_trainer(2, 10);
        for _ in 0..2 {
            trainer.step();
        }
        assert_eq!(trainer.elite().len(), 2);
    }

    #[test]
    fn test_rolling_window_bounded() {
        let mut trainer = tiny_trainer(100, 2);
        for _ in 0..12 {
            trainer.step();
        }
        assert_eq!(trainer.state().window_len(), 5);
        // All samples identical, so the average equals any sample.
        assert!((trainer.state().rolling_average() - -96.0).abs() < 1e-3);
    }

    #[test]
    fn test_lineage_growth() {
        let mut trainer = tiny_trainer(4, 1);

        // Generation 0: bare iteration indices.
        for _ in 0..4 {
            trainer.step();
        }
        let parent_label = trainer.elite()[0].lineage.clone();
        let index: u64 = parent_label.parse().expect("gen-0 lineage is an index");
        assert!(index < 4);

        // Generation 1: parent label, a space, then the offset.
        for _ in 0..4 {
            trainer.step();
        }
        let child_label = &trainer.elite()[0].lineage;
        assert!(
            child_label.starts_with(&format!("{} ", parent_label)),
            "{:?} does not extend {:?}",
            child_label,
            parent_label
        );
        let offset: u64 = child_label
            .rsplit(' ')
            .next()
            .unwrap()
            .parse()
            .expect("offset suffix");
        assert!(offset < 4);
    }

    #[test]
    fn test_pause_preserves_state() {
        let mut trainer = tiny_trainer(4, 2);
        let pause = trainer.pause_handle();

        // Pre-set pause: run returns without stepping.
        pause.store(true, Ordering::Relaxed);
        trainer.run();
        assert_eq!(trainer.state().iterations, 0);

        for _ in 0..4 {
            trainer.step();
        }
        let elite_before: Vec<String> =
            trainer.elite().iter().map(|c| c.lineage.clone()).collect();

        pause.store(true, Ordering::Relaxed);
        trainer.run();

        let elite_after: Vec<String> =
            trainer.elite().iter().map(|c| c.lineage.clone()).collect();
        assert_eq!(elite_before, elite_after);
        assert_eq!(trainer.state().window_len(), 4);
    }

    #[test]
    fn test_set_elite_rejects_mismatched_shapes() {
        // Trainer configured for 2 layers of 3x3.
        let mut trainer = tiny_trainer(4, 3);

        let good = Candidate {
            fitness: -10.0,
            kernels: KernelStack::identity(3, 2),
            lineage: "0".into(),
        };
        let wrong_layer_count = Candidate {
            fitness: -1.0,
            kernels: KernelStack::identity(3, 3),
            lineage: "1".into(),
        };
        let wrong_kernel_size = Candidate {
            fitness: -1.0,
            kernels: KernelStack::identity(4, 2),
            lineage: "2".into(),
        };

        trainer.set_elite(vec![wrong_layer_count, good, wrong_kernel_size]);

        assert_eq!(trainer.elite().len(), 1);
        assert_eq!(trainer.elite()[0].lineage, "0");

        // The surviving pool must be usable as parents without tripping the
        // shared-shape assumptions downstream.
        trainer.step();
        assert_eq!(trainer.state().iterations, 1);
    }

    #[test]
    fn test_generation_best_survives_selection() {
        let mut trainer = tiny_trainer(4, 2);
        for _ in 0..4 {
            trainer.step();
        }

        // Selection just ran and emptied the buffer; the reported best must
        // still be the completed generation's, not a sentinel.
        assert!(trainer.generation.is_empty());
        assert!((trainer.generation_best() - -96.0).abs() < 1e-3);
    }

    #[test]
    fn test_pool_entry_round_trip() {
        let mut kernels = KernelStack::identity(3, 2);
        kernels.layers[0].data[4] = 0.125;
        kernels.layers[1].data[0] = -7.25;

        let candidate = Candidate {
            fitness: -42.5,
            kernels,
            lineage: "3 1 0".into(),
        };

        let rebuilt = Candidate::from_pool_entry(candidate.to_pool_entry()).unwrap();
        assert_eq!(rebuilt.fitness, candidate.fitness);
        assert_eq!(rebuilt.lineage, candidate.lineage);
        assert_eq!(rebuilt.kernels, candidate.kernels);
    }

    #[test]
    fn test_anneal_perturbs_working_stack() {
        let mut trainer = tiny_trainer(4, 2);
        let before = trainer.kernels().clone();
        trainer.anneal(0.5);
        assert_ne!(trainer.kernels(), &before);

        trainer.reset_kernels();
        assert_eq!(trainer.kernels(), &KernelStack::identity(3, 2));
    }
}
