// Cryptex Search Engine
// Generic best-first search over compiled pattern states

use crate::model::PriorModel;
use crate::pattern::NodeRef;
use crate::state::{compile, transitions, Cont, Step};
use crate::types::{DecodeCtx, DecodeError, Limits, SolveResult, WORD_DELIM};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rustc_hash::FxHashMap;

/// Search budget and scoring parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    /// Maximum number of distinct decodings returned (K)
    pub max_results: usize,

    /// Hard cap on search rounds, the overall termination guarantee
    pub max_rounds: usize,

    /// Frontier size that triggers a swap and the sampled cutoff
    pub frontier_cap: usize,

    /// Scores sampled when estimating the cutoff percentile
    pub sample_size: usize,

    /// Flat log-score bonus per emitted token; biases the search toward
    /// longer completions at equal per-letter confidence
    pub length_bonus: f64,

    /// Seed for the cutoff sampling; fixes the result order across runs
    pub seed: u64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_results: 100,
            max_rounds: 1000,
            frontier_cap: 1_000_000,
            sample_size: 10_000,
            length_bonus: 2.0,
            seed: 0,
        }
    }
}

/// Counters exposed for instrumentation and tests
///
/// A pattern rejected by admission control leaves these untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Completed search rounds
    pub rounds: usize,

    /// States expanded through the transition function
    pub expansions: usize,

    /// Token-emitting successors pushed to the next frontier
    pub emitted: usize,

    /// Accepted decodings offered to the result pool
    pub finalized: usize,
}

/// One frontier entry: a state, its decode context, and the log score
struct Hypothesis {
    state: Cont,
    ctx: DecodeCtx,
    score: f64,
}

/// Pattern decoder combining compilation, transition semantics, the prior
/// model, and the best-first search
///
/// A `Decoder` is cheap to share: `solve` never mutates it, so independent
/// queries may run on parallel threads over one instance.
pub struct Decoder {
    model: PriorModel,
    limits: Limits,
    params: SearchParams,
}

impl Decoder {
    /// Decoder with default limits and parameters
    pub fn new(model: PriorModel) -> Self {
        Self {
            model,
            limits: Limits::default(),
            params: SearchParams::default(),
        }
    }

    /// Decoder with explicit admission limits and search parameters
    pub fn with_params(model: PriorModel, limits: Limits, params: SearchParams) -> Self {
        Self {
            model,
            limits,
            params,
        }
    }

    /// Decode a pattern into the top-K most probable messages
    ///
    /// `word_lengths`, when given, prescribes the exact length of every
    /// decoded word in order. An exhausted search returns an empty list,
    /// never an error.
    pub fn solve(
        &self,
        pattern: &NodeRef,
        word_lengths: Option<Vec<usize>>,
    ) -> Result<Vec<SolveResult>, DecodeError> {
        let mut stats = SearchStats::default();
        self.solve_instrumented(pattern, word_lengths, &mut stats)
    }

    /// Like [`solve`](Self::solve), but accumulates search counters into
    /// the caller's [`SearchStats`]
    pub fn solve_instrumented(
        &self,
        pattern: &NodeRef,
        word_lengths: Option<Vec<usize>>,
        stats: &mut SearchStats,
    ) -> Result<Vec<SolveResult>, DecodeError> {
        // Admission gates run before any search work
        let start = compile(pattern, &self.limits)?;
        Ok(self.run(start, DecodeCtx::new(word_lengths), stats))
    }

    /// The round loop over the current/next frontiers
    fn run(
        &self,
        start: crate::state::StateRef,
        ctx: DecodeCtx,
        stats: &mut SearchStats,
    ) -> Vec<SolveResult> {
        let params = &self.params;
        let mut rng = ChaCha20Rng::seed_from_u64(params.seed);

        let mut current = vec![Hypothesis {
            state: Some(start),
            ctx,
            score: 0.0,
        }];
        let mut next: Vec<Hypothesis> = Vec::new();
        let mut pool: FxHashMap<String, f64> = FxHashMap::default();

        while !current.is_empty() && stats.rounds < params.max_rounds {
            stats.rounds += 1;
            let threshold = self.cutoff(&current, &pool, &mut rng);
            let mut eps_frontier: Vec<Hypothesis> = Vec::new();

            for hyp in current.drain(..) {
                if hyp.score < threshold {
                    continue;
                }
                let state = match &hyp.state {
                    Some(s) => s.clone(),
                    None => {
                        self.finalize(hyp, &mut pool, stats);
                        continue;
                    }
                };

                stats.expansions += 1;
                // The prior depends only on the hypothesis context, so one
                // lookup covers every emitting move of this expansion.
                let mut prior = None;
                for step in transitions(&state, &hyp.ctx) {
                    match step {
                        Step::Eps { next: succ, ctx: succ_ctx } => {
                            eps_frontier.push(Hypothesis {
                                state: succ,
                                ctx: succ_ctx,
                                score: hyp.score,
                            });
                        }
                        Step::Emit { probs, next: succ } => {
                            let prior = prior.get_or_insert_with(|| {
                                self.model
                                    .probabilities(hyp.ctx.prev_word(), &hyp.ctx.prefix)
                            });
                            for token in 0..crate::types::NUM_TOKENS as u8 {
                                let joint = probs.get(token) * prior.get(token);
                                if joint <= 0.0 {
                                    continue;
                                }
                                if let Some(succ_ctx) = hyp.ctx.apply(token) {
                                    stats.emitted += 1;
                                    next.push(Hypothesis {
                                        state: succ.clone(),
                                        ctx: succ_ctx,
                                        score: hyp.score + joint.ln() + params.length_bonus,
                                    });
                                }
                            }
                        }
                    }
                }
            }

            prune_pool(&mut pool, params.max_results);

            // Swap to the token frontier once the epsilon work drains or
            // the next frontier outgrows its cap; merging keeps pending
            // epsilon states alive across the swap.
            if eps_frontier.is_empty() || next.len() > params.frontier_cap {
                eps_frontier.append(&mut next);
            }
            current = eps_frontier;
        }

        let mut results: Vec<SolveResult> = pool
            .into_iter()
            .map(|(message, score)| SolveResult { message, score })
            .collect();
        results.sort_unstable_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.message.cmp(&b.message))
        });
        results.truncate(params.max_results);
        results
    }

    /// Adaptive pruning threshold for one round
    ///
    /// The higher of a sampled percentile of the frontier (approximating
    /// the score that keeps roughly `frontier_cap` survivors without a
    /// full sort) and the K-th best finalized score so far.
    fn cutoff(
        &self,
        current: &[Hypothesis],
        pool: &FxHashMap<String, f64>,
        rng: &mut ChaCha20Rng,
    ) -> f64 {
        let params = &self.params;
        let mut threshold = f64::NEG_INFINITY;

        if current.len() > params.frontier_cap {
            let mut sampled: Vec<f64> = current
                .choose_multiple(rng, params.sample_size)
                .map(|h| h.score)
                .collect();
            sampled.sort_unstable_by(|a, b| b.total_cmp(a));
            let keep = (sampled.len() * params.frontier_cap / current.len())
                .min(sampled.len() - 1);
            threshold = sampled[keep];
        }

        if pool.len() >= params.max_results {
            let mut scores: Vec<f64> = pool.values().copied().collect();
            scores.sort_unstable_by(|a, b| b.total_cmp(a));
            let kth = scores[params.max_results - 1];
            if kth > threshold {
                threshold = kth;
            }
        }

        threshold
    }

    /// Accept one decoding into the result pool
    ///
    /// A trailing unfinished word is closed implicitly, charged the same
    /// prior mass an explicit close would pay; hypotheses whose trailing
    /// prefix is no dictionary word, whose length queue is unsatisfied, or
    /// which decoded nothing at all are dropped.
    fn finalize(&self, hyp: Hypothesis, pool: &mut FxHashMap<String, f64>, stats: &mut SearchStats) {
        let mut ctx = hyp.ctx;
        let mut score = hyp.score;

        if !ctx.prefix.is_empty() {
            let close = self
                .model
                .probabilities(ctx.prev_word(), &ctx.prefix)
                .get(WORD_DELIM);
            if close <= 0.0 {
                return;
            }
            ctx = match ctx.apply(WORD_DELIM) {
                Some(closed) => closed,
                None => return,
            };
            score += close.ln() + self.params.length_bonus;
        }

        if let Some(lens) = &ctx.lengths {
            if !lens.is_empty() {
                return;
            }
        }
        if ctx.words.is_empty() {
            return;
        }

        stats.finalized += 1;
        let entry = pool.entry(ctx.words.join(" ")).or_insert(f64::NEG_INFINITY);
        if score > *entry {
            *entry = score;
        }
    }
}

/// Keep the result pool bounded between rounds
///
/// Collisions were already resolved on insert; this only sheds entries
/// that can no longer reach the top K.
fn prune_pool(pool: &mut FxHashMap<String, f64>, k: usize) {
    if pool.len() <= 2 * k {
        return;
    }
    let mut entries: Vec<(String, f64)> = pool.drain().collect();
    entries.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(k);
    pool.extend(entries);
}
