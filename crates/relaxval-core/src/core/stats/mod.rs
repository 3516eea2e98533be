//! Statistics used by the analysis stage.
//!
//! Descriptive summaries, rank and product-moment correlation, the
//! non-parametric tests (Mann-Whitney U, Wilcoxon signed-rank, Kruskal-Wallis)
//! and effect sizes. Distribution tails come from [`special`].

pub mod correlation;
pub mod descriptive;
pub mod effect;
pub mod hypothesis;
pub mod special;
