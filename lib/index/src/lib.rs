//! The join/aggregation kernel of the full-text search operator.
//!
//! A text query arrives here as per-term posting streams
//! ([WordEntityPostings](text_fusion_model::WordEntityPostings) bundles) that have
//! already been fetched and decompressed. The kernel restricts
//! word streams to prefix ranges, intersects the streams by text record while
//! preserving per-record cross-products, joins in entity postings, and aggregates
//! the result into a table of distinct entities with their top-k records.
//!
//! All operations are pure over their inputs and synchronous; the surrounding
//! engine may run many invocations in parallel on disjoint inputs. Cancellation
//! is checked by the caller between kernel calls.

mod aggregate;
mod cross_product;
mod filter_aggregate;
mod intersect;
mod limits;
mod range_filter;

pub use aggregate::{
    agg_rows_and_take_top_k_contexts, agg_scores_and_take_top_k_contexts,
    mult_vars_agg_scores_and_take_top_k_contexts, top_k_by_scores,
};
pub use cross_product::{append_cross_product_with_maps, append_cross_product_with_sets};
pub use filter_aggregate::{
    mult_vars_filter_agg_scores_and_take_top_k_contexts,
    mult_vars_filter_agg_scores_and_take_top_k_contexts_map,
    one_var_filter_agg_scores_and_take_top_k_contexts,
    one_var_filter_agg_scores_and_take_top_k_contexts_map,
};
pub use intersect::{
    cross_intersect, cross_intersect_k_way, intersect_postings_with_entity_block,
    intersect_two_posting_lists,
};
pub use limits::AggregationLimits;
pub use range_filter::filter_by_range;
