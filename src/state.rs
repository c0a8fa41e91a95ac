// Cryptex Search States
// Compiles pattern nodes into continuation-carrying states and defines
// the transition semantics the search engine walks

use crate::pattern::{complexity, size, validate, CharClass, NodeRef, PatternNode};
use crate::types::{DecodeCtx, DecodeError, Limits, TokenProbs, WORD_DELIM};
use std::rc::Rc;

/// Confidence a noisy symbol places on its nominal letter
pub const NOISY_CONFIDENCE: f64 = 0.8;

/// Sentinel for "state has not been re-entered yet"
const FRESH: usize = usize::MAX;

/// Shared reference to an immutable search state
pub type StateRef = Rc<State>;

/// A continuation: the state to resume once this sub-pattern is exhausted.
/// `None` means the chain is fully unwound and the decode is accepted.
pub type Cont = Option<StateRef>;

/// One in-flight position within a compiled pattern
///
/// Each variant carries its continuation explicitly instead of relying on a
/// call stack, since many sibling states coexist in the search frontier.
/// States are immutable and `Rc`-shared; advancing one allocates a successor
/// that shares everything it can with its predecessor.
#[derive(Debug)]
pub enum State {
    /// A single letter slot about to emit
    Symbol { class: CharClass, cont: Cont },

    /// Post-letter step: continue the word, or close it where permitted
    Close { cont: Cont },

    /// Anagram with a used-children bitset
    ///
    /// `entered_at` records the consumed-token count when the current child
    /// round began; a round that consumes nothing flips `ordered`, which
    /// pins the remaining rounds to fixed index order so permutations of
    /// empty productions are never explored.
    Anagram {
        children: Rc<[NodeRef]>,
        used: u64,
        ordered: bool,
        entered_at: usize,
        cont: Cont,
    },

    /// Choice among alternatives, decided by the frontier branch taken
    Choice { children: Rc<[NodeRef]>, cont: Cont },

    /// Fixed repetition with a remaining count
    Count {
        child: NodeRef,
        remaining: usize,
        cont: Cont,
    },

    /// Open repetition; `entered_at` guards against zero-token loops
    OrMore {
        child: NodeRef,
        at_least: usize,
        entered_at: usize,
        cont: Cont,
    },

    /// In-order children with a cursor
    List {
        children: Rc<[NodeRef]>,
        index: usize,
        cont: Cont,
    },

    /// Like List, but brackets the children in a quote-depth increment
    Quote {
        children: Rc<[NodeRef]>,
        index: usize,
        cont: Cont,
    },

    /// Optional child: skip or take
    Maybe { child: NodeRef, cont: Cont },

    /// Two ordered lists advanced head-first in either order
    Interleave {
        a: Rc<[NodeRef]>,
        ai: usize,
        b: Rc<[NodeRef]>,
        bi: usize,
        cont: Cont,
    },

    /// Ring of children; first expansion picks rotation and direction
    Chain { children: Rc<[NodeRef]>, cont: Cont },

    /// Conjunction running both sides' transition systems in lockstep
    And { left: Cont, right: Cont, cont: Cont },

    /// Explicit word delimiter
    Boundary { cont: Cont },
}

/// One move offered by a state
#[derive(Debug)]
pub enum Step {
    /// No token consumed; may carry a quote-depth change in `ctx`
    Eps { next: Cont, ctx: DecodeCtx },

    /// A token-emitting move; the engine applies the chosen token to the
    /// context and weighs `probs` against the prior model
    Emit { probs: TokenProbs, next: Cont },
}

/// Compile a pattern into its start state
///
/// Purely structural: the prior model is never consulted. All admission
/// gates run here, before any search work.
pub fn compile(root: &NodeRef, limits: &Limits) -> Result<StateRef, DecodeError> {
    let sz = size(root);
    if sz > limits.max_pattern_len {
        return Err(DecodeError::PatternTooLong {
            actual: sz,
            limit: limits.max_pattern_len,
        });
    }
    validate(root)?;
    let cx = complexity(root);
    if cx > limits.max_complexity {
        return Err(DecodeError::PatternTooComplex {
            actual: cx,
            limit: limits.max_complexity,
        });
    }
    Ok(enter(root, None))
}

/// Build the entry state for a node, resuming `cont` when it is exhausted
pub fn enter(node: &NodeRef, cont: Cont) -> StateRef {
    let slice = |cs: &[NodeRef]| -> Rc<[NodeRef]> { cs.iter().cloned().collect() };
    Rc::new(match node.as_ref() {
        PatternNode::Symbol(class) => State::Symbol {
            class: *class,
            cont,
        },
        PatternNode::Anagram(cs) => State::Anagram {
            children: slice(cs),
            used: 0,
            ordered: false,
            entered_at: FRESH,
            cont,
        },
        PatternNode::Choice(cs) => State::Choice {
            children: slice(cs),
            cont,
        },
        PatternNode::Count(c, n) => State::Count {
            child: c.clone(),
            remaining: *n,
            cont,
        },
        PatternNode::List(cs) => State::List {
            children: slice(cs),
            index: 0,
            cont,
        },
        PatternNode::Maybe(c) => State::Maybe {
            child: c.clone(),
            cont,
        },
        PatternNode::OrMore(c, at_least) => State::OrMore {
            child: c.clone(),
            at_least: *at_least,
            entered_at: FRESH,
            cont,
        },
        PatternNode::Quote(cs) => State::Quote {
            children: slice(cs),
            index: 0,
            cont,
        },
        PatternNode::Interleave(a, b) => State::Interleave {
            a: slice(a),
            ai: 0,
            b: slice(b),
            bi: 0,
            cont,
        },
        PatternNode::Chain(cs) => State::Chain {
            children: slice(cs),
            cont,
        },
        PatternNode::And(l, r) => State::And {
            left: Some(enter(l, None)),
            right: Some(enter(r, None)),
            cont,
        },
        PatternNode::WordBoundary => State::Boundary { cont },
    })
}

/// Bitset covering the first `n` children
#[inline]
fn full_mask(n: usize) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}

/// All moves a state offers under the given context
pub fn transitions(state: &State, ctx: &DecodeCtx) -> Vec<Step> {
    match state {
        State::Symbol { class, cont } => {
            let probs = match class {
                CharClass::Exact(t) => TokenProbs::certain(*t),
                CharClass::Noisy(t) => TokenProbs::noisy(*t, NOISY_CONFIDENCE),
                CharClass::Wildcard => TokenProbs::any_letter(),
            };
            vec![Step::Emit {
                probs,
                next: Some(Rc::new(State::Close { cont: cont.clone() })),
            }]
        }

        State::Close { cont } => {
            // Continuing the word is always offered; at a prescribed
            // length-queue point any further letter is rejected by
            // `DecodeCtx::apply`, so un-closed paths die on their own.
            // The continuation may still hold a Boundary that performs
            // the close itself.
            let mut steps = vec![Step::Eps {
                next: cont.clone(),
                ctx: ctx.clone(),
            }];
            if ctx.can_close() {
                steps.push(Step::Emit {
                    probs: TokenProbs::certain(WORD_DELIM),
                    next: cont.clone(),
                });
            }
            steps
        }

        State::Anagram {
            children,
            used,
            ordered,
            entered_at,
            cont,
        } => {
            if *used == full_mask(children.len()) {
                return vec![Step::Eps {
                    next: cont.clone(),
                    ctx: ctx.clone(),
                }];
            }
            // A completed round that consumed nothing locks the remaining
            // rounds into index order.
            let locked = *ordered || (*entered_at != FRESH && ctx.consumed == *entered_at);
            let mut steps = Vec::new();
            for i in 0..children.len() {
                if used & (1 << i) != 0 {
                    continue;
                }
                // Of identical unused siblings, only the first is entered,
                // so duplicate letters never multiply permutations.
                let duplicate = (0..i)
                    .any(|j| used & (1 << j) == 0 && children[j] == children[i]);
                if duplicate {
                    continue;
                }
                let resumed = Rc::new(State::Anagram {
                    children: children.clone(),
                    used: used | (1 << i),
                    ordered: locked,
                    entered_at: ctx.consumed,
                    cont: cont.clone(),
                });
                steps.push(Step::Eps {
                    next: Some(enter(&children[i], Some(resumed))),
                    ctx: ctx.clone(),
                });
                if locked {
                    break;
                }
            }
            steps
        }

        State::Choice { children, cont } => children
            .iter()
            .map(|c| Step::Eps {
                next: Some(enter(c, cont.clone())),
                ctx: ctx.clone(),
            })
            .collect(),

        State::Count {
            child,
            remaining,
            cont,
        } => {
            if *remaining == 0 {
                return vec![Step::Eps {
                    next: cont.clone(),
                    ctx: ctx.clone(),
                }];
            }
            let resumed = Rc::new(State::Count {
                child: child.clone(),
                remaining: remaining - 1,
                cont: cont.clone(),
            });
            vec![Step::Eps {
                next: Some(enter(child, Some(resumed))),
                ctx: ctx.clone(),
            }]
        }

        State::OrMore {
            child,
            at_least,
            entered_at,
            cont,
        } => {
            let mut steps = Vec::new();
            // A repetition that consumed nothing would repeat forever;
            // withhold further copies until a token has moved.
            if *entered_at == FRESH || ctx.consumed > *entered_at {
                let resumed = Rc::new(State::OrMore {
                    child: child.clone(),
                    at_least: at_least.saturating_sub(1),
                    entered_at: ctx.consumed,
                    cont: cont.clone(),
                });
                steps.push(Step::Eps {
                    next: Some(enter(child, Some(resumed))),
                    ctx: ctx.clone(),
                });
            } else if *at_least > 0 {
                // An empty repetition still counts toward the minimum;
                // drain it without re-entering the child.
                steps.push(Step::Eps {
                    next: Some(Rc::new(State::OrMore {
                        child: child.clone(),
                        at_least: at_least - 1,
                        entered_at: *entered_at,
                        cont: cont.clone(),
                    })),
                    ctx: ctx.clone(),
                });
            }
            if *at_least == 0 {
                steps.push(Step::Eps {
                    next: cont.clone(),
                    ctx: ctx.clone(),
                });
            }
            steps
        }

        State::List {
            children,
            index,
            cont,
        } => {
            if *index == children.len() {
                return vec![Step::Eps {
                    next: cont.clone(),
                    ctx: ctx.clone(),
                }];
            }
            let resumed = Rc::new(State::List {
                children: children.clone(),
                index: index + 1,
                cont: cont.clone(),
            });
            vec![Step::Eps {
                next: Some(enter(&children[*index], Some(resumed))),
                ctx: ctx.clone(),
            }]
        }

        State::Quote {
            children,
            index,
            cont,
        } => {
            if *index == children.len() {
                let mut after = ctx.clone();
                if *index > 0 {
                    after.quote_depth = after.quote_depth.saturating_sub(1);
                }
                return vec![Step::Eps {
                    next: cont.clone(),
                    ctx: after,
                }];
            }
            let mut inside = ctx.clone();
            if *index == 0 {
                inside.quote_depth += 1;
            }
            let resumed = Rc::new(State::Quote {
                children: children.clone(),
                index: index + 1,
                cont: cont.clone(),
            });
            vec![Step::Eps {
                next: Some(enter(&children[*index], Some(resumed))),
                ctx: inside,
            }]
        }

        State::Maybe { child, cont } => vec![
            Step::Eps {
                next: cont.clone(),
                ctx: ctx.clone(),
            },
            Step::Eps {
                next: Some(enter(child, cont.clone())),
                ctx: ctx.clone(),
            },
        ],

        State::Interleave { a, ai, b, bi, cont } => {
            let mut steps = Vec::new();
            if *ai < a.len() {
                let resumed = Rc::new(State::Interleave {
                    a: a.clone(),
                    ai: ai + 1,
                    b: b.clone(),
                    bi: *bi,
                    cont: cont.clone(),
                });
                steps.push(Step::Eps {
                    next: Some(enter(&a[*ai], Some(resumed))),
                    ctx: ctx.clone(),
                });
            }
            if *bi < b.len() {
                let resumed = Rc::new(State::Interleave {
                    a: a.clone(),
                    ai: *ai,
                    b: b.clone(),
                    bi: bi + 1,
                    cont: cont.clone(),
                });
                steps.push(Step::Eps {
                    next: Some(enter(&b[*bi], Some(resumed))),
                    ctx: ctx.clone(),
                });
            }
            if steps.is_empty() {
                steps.push(Step::Eps {
                    next: cont.clone(),
                    ctx: ctx.clone(),
                });
            }
            steps
        }

        State::Chain { children, cont } => {
            let n = children.len();
            if n == 0 {
                return vec![Step::Eps {
                    next: cont.clone(),
                    ctx: ctx.clone(),
                }];
            }
            let mut steps = Vec::new();
            for start in 0..n {
                // Rings of one or two children read the same both ways
                let directions: &[bool] = if n <= 2 { &[true] } else { &[true, false] };
                for &forward in directions {
                    let order: Rc<[NodeRef]> = (0..n)
                        .map(|k| {
                            let idx = if forward {
                                (start + k) % n
                            } else {
                                (start + n - k) % n
                            };
                            children[idx].clone()
                        })
                        .collect();
                    steps.push(Step::Eps {
                        next: Some(Rc::new(State::List {
                            children: order,
                            index: 0,
                            cont: cont.clone(),
                        })),
                        ctx: ctx.clone(),
                    });
                }
            }
            steps
        }

        State::And { left, right, cont } => {
            if left.is_none() && right.is_none() {
                return vec![Step::Eps {
                    next: cont.clone(),
                    ctx: ctx.clone(),
                }];
            }
            let left_moves = left
                .as_ref()
                .map(|s| transitions(s, ctx))
                .unwrap_or_default();
            let right_moves = right
                .as_ref()
                .map(|s| transitions(s, ctx))
                .unwrap_or_default();

            let mut steps = Vec::new();

            // Canonical epsilon order: the left side drains first, so the
            // same joint no-op is never counted twice.
            let mut left_has_eps = false;
            for m in &left_moves {
                if let Step::Eps { next, ctx: after } = m {
                    left_has_eps = true;
                    steps.push(Step::Eps {
                        next: Some(Rc::new(State::And {
                            left: next.clone(),
                            right: right.clone(),
                            cont: cont.clone(),
                        })),
                        ctx: after.clone(),
                    });
                }
            }
            if !left_has_eps {
                for m in &right_moves {
                    if let Step::Eps { next, ctx: after } = m {
                        steps.push(Step::Eps {
                            next: Some(Rc::new(State::And {
                                left: left.clone(),
                                right: next.clone(),
                                cont: cont.clone(),
                            })),
                            ctx: after.clone(),
                        });
                    }
                }
            }

            // A joint token needs both sides emitting at once
            for lm in &left_moves {
                let (lp, ln) = match lm {
                    Step::Emit { probs, next } => (probs, next),
                    _ => continue,
                };
                for rm in &right_moves {
                    let (rp, rn) = match rm {
                        Step::Emit { probs, next } => (probs, next),
                        _ => continue,
                    };
                    let joint = lp.product(rp);
                    if joint.sum() > 0.0 {
                        steps.push(Step::Emit {
                            probs: joint,
                            next: Some(Rc::new(State::And {
                                left: ln.clone(),
                                right: rn.clone(),
                                cont: cont.clone(),
                            })),
                        });
                    }
                }
            }
            steps
        }

        State::Boundary { cont } => {
            // Quote depth suppresses all word-boundary emission, the
            // explicit kind included
            if ctx.quote_depth > 0 {
                return Vec::new();
            }
            vec![Step::Emit {
                probs: TokenProbs::certain(WORD_DELIM),
                next: cont.clone(),
            }]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NUM_LETTERS;

    fn ctx() -> DecodeCtx {
        DecodeCtx::new(None)
    }

    fn eps_targets(steps: &[Step]) -> Vec<&Cont> {
        steps
            .iter()
            .filter_map(|s| match s {
                Step::Eps { next, .. } => Some(next),
                _ => None,
            })
            .collect()
    }

    // ============ Compile / Admission Tests ============

    #[test]
    fn test_compile_simple_pattern() {
        let p = PatternNode::exact_word("CAT");
        assert!(compile(&p, &Limits::default()).is_ok());
    }

    #[test]
    fn test_compile_rejects_complexity() {
        let wide = PatternNode::anagram_of(&"A".repeat(20).replace('A', "Z"));
        let p = PatternNode::and(wide.clone(), wide);
        assert!(matches!(
            compile(&p, &Limits::default()),
            Err(DecodeError::PatternTooComplex { .. })
        ));
    }

    #[test]
    fn test_compile_rejects_length() {
        let p = PatternNode::exact_word(&"A".repeat(600));
        assert!(matches!(
            compile(&p, &Limits::default()),
            Err(DecodeError::PatternTooLong { .. })
        ));
    }

    #[test]
    fn test_compile_rejects_malformed() {
        let p = PatternNode::choice(vec![]);
        assert!(matches!(
            compile(&p, &Limits::default()),
            Err(DecodeError::MalformedPattern(_))
        ));
    }

    // ============ Symbol / Close Tests ============

    #[test]
    fn test_exact_symbol_emits_one_letter() {
        let st = enter(&PatternNode::exact('C'), None);
        let steps = transitions(&st, &ctx());
        assert_eq!(steps.len(), 1);
        match &steps[0] {
            Step::Emit { probs, .. } => {
                assert_eq!(probs.get(3), 1.0);
                assert_eq!(probs.sum(), 1.0);
            }
            _ => panic!("expected emit"),
        }
    }

    #[test]
    fn test_noisy_symbol_spreads_mass() {
        let st = enter(&PatternNode::noisy('C'), None);
        let steps = transitions(&st, &ctx());
        match &steps[0] {
            Step::Emit { probs, .. } => {
                assert_eq!(probs.get(3), NOISY_CONFIDENCE);
                assert!((probs.sum() - 1.0).abs() < 1e-9);
            }
            _ => panic!("expected emit"),
        }
    }

    #[test]
    fn test_wildcard_uniform() {
        let st = enter(&PatternNode::wildcard(), None);
        let steps = transitions(&st, &ctx());
        match &steps[0] {
            Step::Emit { probs, .. } => {
                assert_eq!(probs.get(1), 1.0 / NUM_LETTERS as f64);
                assert_eq!(probs.get(WORD_DELIM), 0.0);
            }
            _ => panic!("expected emit"),
        }
    }

    #[test]
    fn test_close_offers_continue_and_delimiter() {
        let close = State::Close { cont: None };
        let c = ctx().apply(3).unwrap();
        let steps = transitions(&close, &c);
        assert_eq!(steps.len(), 2);
        assert!(matches!(steps[0], Step::Eps { .. }));
        match &steps[1] {
            Step::Emit { probs, .. } => assert_eq!(probs.get(WORD_DELIM), 1.0),
            _ => panic!("expected delimiter emit"),
        }
    }

    #[test]
    fn test_close_suppressed_inside_quote() {
        let close = State::Close { cont: None };
        let mut c = ctx().apply(3).unwrap();
        c.quote_depth = 1;
        let steps = transitions(&close, &c);
        assert_eq!(steps.len(), 1);
        assert!(matches!(steps[0], Step::Eps { .. }));
    }

    #[test]
    fn test_close_at_length_target_offers_both() {
        let close = State::Close { cont: None };
        let c = DecodeCtx::new(Some(vec![1])).apply(3).unwrap();
        let steps = transitions(&close, &c);
        // The continue move survives so that an explicit boundary in the
        // continuation can perform the close itself; a further letter on
        // that path is rejected when applied.
        assert_eq!(steps.len(), 2);
        assert!(matches!(steps[0], Step::Eps { .. }));
        assert!(matches!(steps[1], Step::Emit { .. }));
        assert!(c.apply(1).is_none());
    }

    #[test]
    fn test_close_below_length_target_cannot_close() {
        let close = State::Close { cont: None };
        let c = DecodeCtx::new(Some(vec![2])).apply(3).unwrap();
        let steps = transitions(&close, &c);
        assert_eq!(steps.len(), 1);
        assert!(matches!(steps[0], Step::Eps { .. }));
    }

    // ============ Anagram Tests ============

    #[test]
    fn test_anagram_offers_each_unused_child() {
        let st = enter(&PatternNode::anagram_of("ABC"), None);
        let steps = transitions(&st, &ctx());
        assert_eq!(steps.len(), 3);
    }

    #[test]
    fn test_anagram_skips_duplicate_children() {
        let st = enter(&PatternNode::anagram_of("AAB"), None);
        let steps = transitions(&st, &ctx());
        // Two 'A' children are structurally equal: one entry each for A, B
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn test_anagram_returns_when_spent() {
        let st = State::Anagram {
            children: vec![PatternNode::exact('A')].into_iter().collect(),
            used: 1,
            ordered: false,
            entered_at: 0,
            cont: None,
        };
        let steps = transitions(&st, &ctx());
        assert_eq!(steps.len(), 1);
        assert!(matches!(&steps[0], Step::Eps { next: None, .. }));
    }

    #[test]
    fn test_anagram_locks_order_after_empty_round() {
        // Three optional children; skipping the first consumes nothing,
        // so the resumed anagram must stop branching over orders.
        let node = PatternNode::anagram(vec![
            PatternNode::maybe(PatternNode::exact('A')),
            PatternNode::maybe(PatternNode::exact('B')),
            PatternNode::maybe(PatternNode::exact('C')),
        ]);
        let st = enter(&node, None);
        let c = ctx();
        let steps = transitions(&st, &c);
        assert_eq!(steps.len(), 3);

        // Follow the first branch: Maybe child, then its skip move
        let maybe_state = match &steps[0] {
            Step::Eps { next: Some(s), .. } => s.clone(),
            _ => panic!("expected eps into child"),
        };
        let skip = transitions(&maybe_state, &c);
        let resumed = match &skip[0] {
            Step::Eps { next: Some(s), .. } => s.clone(),
            _ => panic!("expected skip eps"),
        };

        // Same consumed count on re-entry: order is locked to one branch
        let locked_steps = transitions(&resumed, &c);
        assert_eq!(eps_targets(&locked_steps).len(), 1);
    }

    // ============ Repetition Tests ============

    #[test]
    fn test_count_zero_returns() {
        let st = enter(&PatternNode::count(PatternNode::exact('A'), 0), None);
        let steps = transitions(&st, &ctx());
        assert_eq!(steps.len(), 1);
        assert!(matches!(&steps[0], Step::Eps { next: None, .. }));
    }

    #[test]
    fn test_or_more_offers_stop_at_zero() {
        let st = enter(&PatternNode::or_more(PatternNode::exact('A'), 0), None);
        let steps = transitions(&st, &ctx());
        assert_eq!(steps.len(), 2); // one more repetition + stop
    }

    #[test]
    fn test_or_more_requires_minimum() {
        let st = enter(&PatternNode::or_more(PatternNode::exact('A'), 2), None);
        let steps = transitions(&st, &ctx());
        assert_eq!(steps.len(), 1); // repetition only, no stop
    }

    #[test]
    fn test_or_more_guards_empty_repetition() {
        let st = enter(
            &PatternNode::or_more(PatternNode::maybe(PatternNode::exact('A')), 0),
            None,
        );
        let c = ctx();
        let steps = transitions(&st, &c);
        let maybe_state = match &steps[0] {
            Step::Eps { next: Some(s), .. } => s.clone(),
            _ => panic!("expected repetition eps"),
        };
        let resumed = match &transitions(&maybe_state, &c)[0] {
            Step::Eps { next: Some(s), .. } => s.clone(),
            _ => panic!("expected skip eps"),
        };
        // Re-entered with nothing consumed: only the stop move remains
        let steps = transitions(&resumed, &c);
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn test_or_more_drains_minimum_after_empty_repetition() {
        let st = enter(
            &PatternNode::or_more(PatternNode::maybe(PatternNode::exact('A')), 2),
            None,
        );
        let c = ctx();
        let maybe_state = match &transitions(&st, &c)[0] {
            Step::Eps { next: Some(s), .. } => s.clone(),
            _ => panic!("expected repetition eps"),
        };
        let resumed = match &transitions(&maybe_state, &c)[0] {
            Step::Eps { next: Some(s), .. } => s.clone(),
            _ => panic!("expected skip eps"),
        };

        // Empty round with a minimum outstanding: the repetition counts
        // down instead of deadlocking
        let steps = transitions(&resumed, &c);
        assert_eq!(steps.len(), 1);
        let drained = match &steps[0] {
            Step::Eps { next: Some(s), .. } => s.clone(),
            _ => panic!("expected drain eps"),
        };

        // Minimum met: only the stop move remains
        let steps = transitions(&drained, &c);
        assert_eq!(steps.len(), 1);
        assert!(matches!(&steps[0], Step::Eps { next: None, .. }));
    }

    // ============ Structure Tests ============

    #[test]
    fn test_maybe_offers_skip_and_take() {
        let st = enter(&PatternNode::maybe(PatternNode::exact('A')), None);
        let steps = transitions(&st, &ctx());
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn test_choice_offers_each_alternative() {
        let st = enter(
            &PatternNode::choice(vec![PatternNode::exact('A'), PatternNode::exact('B')]),
            None,
        );
        assert_eq!(transitions(&st, &ctx()).len(), 2);
    }

    #[test]
    fn test_interleave_branches_both_sides() {
        let st = enter(
            &PatternNode::interleave(
                vec![PatternNode::exact('A')],
                vec![PatternNode::exact('B')],
            ),
            None,
        );
        assert_eq!(transitions(&st, &ctx()).len(), 2);
    }

    #[test]
    fn test_chain_rotations_and_directions() {
        let st = enter(
            &PatternNode::chain(vec![
                PatternNode::exact('A'),
                PatternNode::exact('B'),
                PatternNode::exact('C'),
            ]),
            None,
        );
        // 3 rotations x 2 directions
        assert_eq!(transitions(&st, &ctx()).len(), 6);
    }

    #[test]
    fn test_chain_pair_skips_backward() {
        let st = enter(
            &PatternNode::chain(vec![PatternNode::exact('A'), PatternNode::exact('B')]),
            None,
        );
        assert_eq!(transitions(&st, &ctx()).len(), 2);
    }

    #[test]
    fn test_quote_brackets_depth() {
        let st = enter(&PatternNode::quote(vec![PatternNode::exact('A')]), None);
        let steps = transitions(&st, &ctx());
        match &steps[0] {
            Step::Eps { ctx: inside, .. } => assert_eq!(inside.quote_depth, 1),
            _ => panic!("expected eps"),
        }
    }

    #[test]
    fn test_boundary_emits_delimiter() {
        let st = enter(&PatternNode::word_boundary(), None);
        let steps = transitions(&st, &ctx());
        assert_eq!(steps.len(), 1);
        match &steps[0] {
            Step::Emit { probs, .. } => assert_eq!(probs.get(WORD_DELIM), 1.0),
            _ => panic!("expected emit"),
        }
    }

    #[test]
    fn test_boundary_suppressed_inside_quote() {
        let st = enter(&PatternNode::word_boundary(), None);
        let mut c = ctx();
        c.quote_depth = 1;
        assert!(transitions(&st, &c).is_empty());
    }

    // ============ Conjunction Tests ============

    #[test]
    fn test_and_joint_emission_multiplies() {
        let st = enter(
            &PatternNode::and(PatternNode::noisy('A'), PatternNode::noisy('A')),
            None,
        );
        let steps = transitions(&st, &ctx());
        assert_eq!(steps.len(), 1);
        match &steps[0] {
            Step::Emit { probs, .. } => {
                assert!((probs.get(1) - NOISY_CONFIDENCE * NOISY_CONFIDENCE).abs() < 1e-12);
            }
            _ => panic!("expected joint emit"),
        }
    }

    #[test]
    fn test_and_discards_disjoint_emissions() {
        let st = enter(
            &PatternNode::and(PatternNode::exact('A'), PatternNode::exact('B')),
            None,
        );
        // Product vector sums to zero: the move disappears
        assert!(transitions(&st, &ctx()).is_empty());
    }

    #[test]
    fn test_and_left_epsilons_first() {
        let st = enter(
            &PatternNode::and(
                PatternNode::maybe(PatternNode::exact('A')),
                PatternNode::maybe(PatternNode::exact('B')),
            ),
            None,
        );
        let steps = transitions(&st, &ctx());
        // Only the left side's two epsilon moves are offered
        assert_eq!(steps.len(), 2);
        assert!(steps.iter().all(|s| matches!(s, Step::Eps { .. })));
    }

    #[test]
    fn test_and_returns_when_both_spent() {
        let st = State::And {
            left: None,
            right: None,
            cont: None,
        };
        let steps = transitions(&st, &ctx());
        assert_eq!(steps.len(), 1);
        assert!(matches!(&steps[0], Step::Eps { next: None, .. }));
    }
}
