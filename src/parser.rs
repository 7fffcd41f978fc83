//! Front-ends that turn tree descriptions into [`crate::Tree`]s.
//!
//! The main one is a small custom language:
//!
//! ```raw
//! # Comments start with a hash.
//! tree main = Sequence {
//!     var door_open = false
//!     if (!door_open) {
//!         OpenDoor
//!     }
//!     Timeout "give up" (msec <- "5000") {
//!         fetch(item <- "cup", result -> fetched)
//!     }
//! }
//!
//! tree fetch(in item, out result) = Queue {
//!     PickUp (item <- item)
//!     Report (output -> result, text <- "{item}")
//! }
//! ```
//!
//! * A node is its type name, an optional quoted instance name, optional port mappings in
//!   parentheses and optional children in braces.
//! * `port <- key`, `port -> key` and `port <-> key` map a port to a blackboard key as input,
//!   output or both. A quoted string is a literal, except that `"{key}"` refers to `key`.
//! * A type name that is not registered refers to another tree, which is instantiated as a
//!   subtree. Its parameters are mapped like ports. A tree cannot include itself.
//! * `if (cond) { ... } else { ... }` becomes an `if` node, `!` an `Inverter`.
//! * `var name = true` declares a variable in the enclosing block; a variable used as a
//!   condition reads as `IsTrue`.
//!
//! Trees can also be described in YAML, see [`load_yaml`].

mod loader;
mod nom_parser;
mod yaml_parser;

pub use self::{
    loader::{load, load_str},
    nom_parser::{parse_file, PortDef, PortMap, TreeDef, TreeRootDef, TreeSource, ValueDef, VarDef},
    yaml_parser::load_yaml,
};
