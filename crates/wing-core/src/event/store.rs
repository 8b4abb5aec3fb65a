use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, error, warn};
use uuid::Uuid;

use super::{FlowEvent, FlowEventKind};

/// Almacenamiento de eventos append-only.
pub trait EventStore {
    /// Agrega un evento a partir de su kind y devuelve el evento completo (con seq y ts).
    fn append_kind(&mut self, flow_id: Uuid, kind: FlowEventKind) -> FlowEvent;
    /// Lista eventos de un flujo (orden ascendente por seq).
    fn list(&self, flow_id: Uuid) -> Vec<FlowEvent>;
}

#[derive(Default)]
pub struct InMemoryEventStore {
    pub inner: HashMap<Uuid, Vec<FlowEvent>>,
}

impl EventStore for InMemoryEventStore {
    fn append_kind(&mut self, flow_id: Uuid, kind: FlowEventKind) -> FlowEvent {
        let vec = self.inner.entry(flow_id).or_default();
        let seq = vec.len() as u64;
        let ev = FlowEvent { seq, flow_id, kind, ts: Utc::now() };
        vec.push(ev.clone());
        ev
    }

    fn list(&self, flow_id: Uuid) -> Vec<FlowEvent> {
        self.inner.get(&flow_id).cloned().unwrap_or_default()
    }
}

/// Store que además persiste cada evento como una línea JSON.
///
/// Varias invocaciones (una por etapa en el script de envío) comparten el
/// mismo fichero; cada una escribe bajo su propio `flow_id`. Un fallo de
/// escritura se registra con `error!` y no aborta la etapa.
pub struct JsonlEventStore {
    path: PathBuf,
    memory: InMemoryEventStore,
}

impl JsonlEventStore {
    /// Abre (o prepara) el fichero y carga los eventos ya presentes.
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let mut memory = InMemoryEventStore::default();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for (n, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<FlowEvent>(&line) {
                    Ok(ev) => memory.inner.entry(ev.flow_id).or_default().push(ev),
                    Err(e) => warn!("skip malformed event line={} file={} err={e}", n + 1, path.display()),
                }
            }
        }
        Ok(Self { path, memory })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Todos los `flow_id` conocidos en el fichero.
    pub fn flow_ids(&self) -> Vec<Uuid> {
        self.memory.inner.keys().copied().collect()
    }

    fn persist(&self, ev: &FlowEvent) -> std::io::Result<()> {
        let line = serde_json::to_string(ev).map_err(std::io::Error::other)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")
    }
}

impl EventStore for JsonlEventStore {
    fn append_kind(&mut self, flow_id: Uuid, kind: FlowEventKind) -> FlowEvent {
        debug!("append_kind flow_id={flow_id} kind={}", kind.variant_name());
        let ev = self.memory.append_kind(flow_id, kind);
        if let Err(e) = self.persist(&ev) {
            error!("append_kind:persist error file={} err={e}", self.path.display());
        }
        ev
    }

    fn list(&self, flow_id: Uuid) -> Vec<FlowEvent> {
        self.memory.list(flow_id)
    }
}
