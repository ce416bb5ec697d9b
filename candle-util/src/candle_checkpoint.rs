use candle_core::{Device, Tensor};
use candle_nn::VarMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A single slot holding a snapshot of the variables in a `VarMap`
pub trait CheckpointStore {
    /// Overwrite the slot with the current values of `parameters`
    fn save(&mut self, parameters: &VarMap) -> anyhow::Result<()>;

    /// Overwrite `parameters` in place with the values in the slot
    fn load(&self, parameters: &VarMap) -> anyhow::Result<()>;

    /// Whether `save` has succeeded at least once
    fn has_snapshot(&self) -> bool;
}

/// Keeps deep copies of the variables in memory
#[derive(Default)]
pub struct InMemoryCheckpoint {
    snapshot: HashMap<String, Tensor>,
}

impl InMemoryCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for InMemoryCheckpoint {
    fn save(&mut self, parameters: &VarMap) -> anyhow::Result<()> {
        let vars = parameters
            .data()
            .lock()
            .map_err(|e| anyhow::anyhow!("variable map lock: {}", e))?;

        let mut snapshot = HashMap::with_capacity(vars.len());
        for (name, var) in vars.iter() {
            snapshot.insert(name.clone(), var.as_tensor().copy()?);
        }
        self.snapshot = snapshot;
        Ok(())
    }

    fn load(&self, parameters: &VarMap) -> anyhow::Result<()> {
        set_variables(parameters, &self.snapshot)
    }

    fn has_snapshot(&self) -> bool {
        !self.snapshot.is_empty()
    }
}

/// Writes the variables to a `safetensors` file; every `save`
/// overwrites the same file, so runs sharing a path clobber each other.
pub struct FileCheckpoint {
    path: PathBuf,
    saved: bool,
}

impl FileCheckpoint {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            saved: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CheckpointStore for FileCheckpoint {
    fn save(&mut self, parameters: &VarMap) -> anyhow::Result<()> {
        parameters.save(&self.path)?;
        self.saved = true;
        Ok(())
    }

    fn load(&self, parameters: &VarMap) -> anyhow::Result<()> {
        let device = parameters
            .all_vars()
            .first()
            .map(|v| v.device().clone())
            .unwrap_or(Device::Cpu);
        let snapshot = candle_core::safetensors::load(&self.path, &device)?;
        set_variables(parameters, &snapshot)
    }

    fn has_snapshot(&self) -> bool {
        self.saved
    }
}

fn set_variables(parameters: &VarMap, snapshot: &HashMap<String, Tensor>) -> anyhow::Result<()> {
    let vars = parameters
        .data()
        .lock()
        .map_err(|e| anyhow::anyhow!("variable map lock: {}", e))?;

    for (name, var) in vars.iter() {
        let saved = snapshot
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("`{}` is missing in the checkpoint", name))?;
        var.set(&saved.to_device(var.device())?)?;
    }
    Ok(())
}
