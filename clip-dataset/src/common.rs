pub use crate::error::{DatasetError, Result};
pub use indexmap::{IndexMap, IndexSet};
pub use itertools::Itertools as _;
pub use log::{debug, info, warn};
pub use rand::prelude::*;
pub use serde::{Deserialize, Serialize};
pub use std::{
    collections::BTreeMap,
    fmt::Debug,
    fs,
    future::Future,
    io,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    pin::Pin,
    str::FromStr,
    sync::Arc,
    thread,
    time::Duration,
};
pub use tch::{vision, Device, IndexOp, Kind, TchError, Tensor};
pub use tch_tensor_like::TensorLike;
