//! Resume boundaries for incremental crawls
//!
//! Files on the remote tree are published into date partitions below a
//! product directory and old partitions do not change. Once the catalogue
//! holds files from a partition, every older partition of that product is
//! assumed complete and is not listed again.
//!
//! ```text
//! catalogue: /free/prodABC/2024-02-20/b.csv   -> boundary prodABC = 2024-02-20
//!
//! /free/prodABC/2024-01-10   before boundary   skip
//! /free/prodABC/2024-02-20   equal             descend
//! /free/prodABC/2024-03-05   after             descend
//! /free/prodABC/docs         not a partition   descend
//! ```

mod index;
mod layout;
mod partition;

pub use index::{ResumeDecision, ResumeIndex};
pub use layout::{default_product_regex, Partition, PathLayout, DEFAULT_PRODUCT_PATTERN};
pub use partition::{DatePrefix, InvalidPartition, Precision};
