//! Built-in document transforms.

pub mod aggregate;
pub mod compute_id;
pub mod department;
pub mod rank;
pub mod remove_key;

pub use aggregate::{
    aggregate_by_department, aggregate_count, aggregate_rate, group, make_aggregate, AggregateKey,
    AggregationRule, Reduction,
};
pub use compute_id::{stringify, value_id, ComputeIdFrom};
pub use department::{ComputeDepartmentKey, SetDepartment, DEPARTMENT_FIELD};
pub use rank::ComputeRank;
pub use remove_key::{MissingKeyPolicy, RemoveKey};
