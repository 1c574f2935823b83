//! Command Dispatcher - local edit intents to store operations.
//!
//! A region never writes to the store itself. It builds a [`Command`] whose
//! path is relative to its parent's value and dispatches it; the dispatcher
//! climbs the parent chain, letting every ancestor extend the path with its
//! own coordinate fragment, until the coordinate is absolute or there are no
//! more ancestors. The final coordinate names the store target.
//!
//! ```text
//! text[data-prop=title]            "title"
//!  └ item[data-prop=0]             "0.title"
//!     └ array[data-prop=items]     "items.0.title"
//!        └ page[data-prop=@file[a.md]]  "@file[a.md].items.0.title"  → File(a.md), "items.0.title"
//! ```

use crate::engine::path::Coordinate;
use crate::error::DispatchError;
use crate::regions::binding::BindingNode;
use crate::store::{InputConfig, StoreTarget};

// =============================================================================
// Commands
// =============================================================================

/// A local edit intent. Paths are relative to the origin's parent value.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Open the host editor at a coordinate.
    Edit { path: String },
    Set {
        path: String,
        value: serde_json::Value,
    },
    AddArrayItem {
        path: String,
        index: Option<usize>,
        value: Option<serde_json::Value>,
        source_index: Option<usize>,
    },
    RemoveArrayItem { path: String, index: usize },
    /// `from_path` is a full coordinate when the item comes from another list.
    MoveArrayItem {
        path: String,
        from: usize,
        to: usize,
        from_path: Option<String>,
    },
    GetInputConfig { path: String },
}

impl Command {
    pub fn path(&self) -> &str {
        match self {
            Self::Edit { path }
            | Self::Set { path, .. }
            | Self::AddArrayItem { path, .. }
            | Self::RemoveArrayItem { path, .. }
            | Self::MoveArrayItem { path, .. }
            | Self::GetInputConfig { path } => path,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Edit { .. } => "edit",
            Self::Set { .. } => "set",
            Self::AddArrayItem { .. } => "add-array-item",
            Self::RemoveArrayItem { .. } => "remove-array-item",
            Self::MoveArrayItem { .. } => "move-array-item",
            Self::GetInputConfig { .. } => "get-input-config",
        }
    }
}

/// What a dispatched command produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Done,
    InputConfig(InputConfig),
}

// =============================================================================
// Routing
// =============================================================================

pub(crate) async fn route(origin: &BindingNode, command: Command) -> Result<Reply, DispatchError> {
    let resolved = origin
        .resolve_coordinate(command.path())
        .ok_or_else(|| DispatchError::Unresolved(command.path().to_string()))
        .and_then(|full| {
            let coordinate = Coordinate::parse(&full)?;
            Ok((full, coordinate))
        });

    let (full, coordinate) = match resolved {
        Ok(resolved) => resolved,
        Err(err) => {
            if let Command::GetInputConfig { .. } = command {
                tracing::debug!(host = %origin.host(), error = %err, "input config unresolved, using restricted default");
                return Ok(Reply::InputConfig(InputConfig::restricted()));
            }
            return Err(err);
        }
    };

    let target = StoreTarget::from_coordinate(&coordinate);
    let path = coordinate.path.as_str();
    tracing::debug!(
        host = %origin.host(),
        command = command.name(),
        coordinate = %full,
        %target,
        "dispatching command"
    );

    let store = origin.env().store().clone();
    match command {
        Command::Edit { .. } => store.edit(&target, path).await?,
        Command::Set { value, .. } => store.set(&target, path, value).await?,
        Command::AddArrayItem {
            index,
            value,
            source_index,
            ..
        } => {
            store
                .add_array_item(&target, path, index, value, source_index)
                .await?
        }
        Command::RemoveArrayItem { index, .. } => {
            store.remove_array_item(&target, path, index).await?
        }
        Command::MoveArrayItem {
            from, to, from_path, ..
        } => {
            let from_path = from_path.map(|source| relative_to(&target, source));
            store
                .move_array_item(&target, path, from, to, from_path.as_deref())
                .await?
        }
        Command::GetInputConfig { .. } => {
            let config = match store.input_config(&target, path).await {
                Ok(config) => config,
                Err(err) => {
                    tracing::debug!(%target, error = %err, "input config lookup failed, using restricted default");
                    InputConfig::restricted()
                }
            };
            return Ok(Reply::InputConfig(config));
        }
    }
    Ok(Reply::Done)
}

/// A source list coordinate as a path inside `target` when both share it.
fn relative_to(target: &StoreTarget, source: String) -> String {
    match Coordinate::parse(&source) {
        Ok(coordinate) if StoreTarget::from_coordinate(&coordinate) == *target => coordinate.path,
        _ => source,
    }
}
