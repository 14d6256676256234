//! Files produced out of band for the oracle and hybrid strategies: placement lists, dense
//! membership matrices and ranked content lists.
//!
//! The oracle's "future" is precomputed offline and replayed here; nothing in a run derives it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info};

use crate::error::ArtifactError;
use crate::io::read_to_string;
use crate::{ContentId, NodeId};

/// Lines which carry data: trimmed, numbered from 1, blank lines and `#` comments skipped
fn data_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

fn parse_error(path: &Path, line: usize, message: impl Into<String>) -> ArtifactError {
    ArtifactError::Parse {
        path: path.to_path_buf(),
        line,
        message: message.into(),
    }
}

/// Parses `node content_index` pairs, whitespace separated, one per line
pub fn parse_placement(text: &str, path: &Path) -> Result<Vec<(NodeId, usize)>, ArtifactError> {
    data_lines(text)
        .map(|(line, content)| {
            let mut fields = content.split_whitespace();
            let (Some(node), Some(index), None) = (fields.next(), fields.next(), fields.next()) else {
                return Err(parse_error(path, line, "expected `node content_index`"));
            };
            let node = node
                .parse()
                .map_err(|e| parse_error(path, line, format!("invalid node id '{node}': {e}")))?;
            let index = index
                .parse()
                .map_err(|e| parse_error(path, line, format!("invalid content index '{index}': {e}")))?;
            Ok((node, index))
        })
        .collect()
}

/// Parses one content id per line
pub fn parse_content_list(text: &str, path: &Path) -> Result<Vec<ContentId>, ArtifactError> {
    data_lines(text)
        .map(|(line, content)| {
            content
                .parse()
                .map_err(|e| parse_error(path, line, format!("invalid content id '{content}': {e}")))
        })
        .collect()
}

/// Reads a placement file. An empty placement is legal, the oracle may keep every cache empty
pub fn read_placement(path: &Path) -> Result<Vec<(NodeId, usize)>, ArtifactError> {
    parse_placement(&read_to_string(path)?, path)
}

/// Reads a ranked or indexed content list, which must not be empty
pub fn read_content_list(path: &Path) -> Result<Vec<ContentId>, ArtifactError> {
    let contents = parse_content_list(&read_to_string(path)?, path)?;
    if contents.is_empty() {
        return Err(ArtifactError::Empty(path.to_path_buf()));
    }
    Ok(contents)
}

/// Dense node × content membership, row index = node id, column index = content index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MembershipMatrix {
    rows: Vec<Vec<bool>>,
}

impl MembershipMatrix {
    pub fn from_rows(rows: Vec<Vec<bool>>) -> Self {
        Self { rows }
    }

    /// Parses comma separated rows. Cells may be written as integers or floats, a cell is a member
    /// iff it equals 1. Every row must be as wide as the first
    pub fn parse(text: &str, path: &Path) -> Result<Self, ArtifactError> {
        let mut rows: Vec<Vec<bool>> = Vec::new();
        for (line, row) in data_lines(text) {
            let cells = row
                .split(',')
                .map(|cell| {
                    let cell = cell.trim();
                    cell.parse::<f64>()
                        .map(|value| value == 1.0)
                        .map_err(|e| parse_error(path, line, format!("invalid cell '{cell}': {e}")))
                })
                .collect::<Result<Vec<bool>, _>>()?;
            if let Some(first) = rows.first() {
                if cells.len() != first.len() {
                    return Err(parse_error(
                        path,
                        line,
                        format!("row has {} cells, expected {}", cells.len(), first.len()),
                    ));
                }
            }
            rows.push(cells);
        }
        if rows.is_empty() {
            return Err(ArtifactError::Empty(path.to_path_buf()));
        }
        Ok(Self { rows })
    }

    pub fn read(path: &Path) -> Result<Self, ArtifactError> {
        Self::parse(&read_to_string(path)?, path)
    }

    /// Out of range cells are not members
    pub fn is_member(&self, node: NodeId, column: usize) -> bool {
        self.rows
            .get(node as usize)
            .and_then(|row| row.get(column))
            .copied()
            .unwrap_or(false)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// How the matrix columns and placement indices of a snapshot map to content ids
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ContentIndex {
    /// Index `i` is content `i + 1`
    #[default]
    OneBased,
    /// Index `i` is the `i`-th listed content
    Listed {
        ids: Vec<ContentId>,
        columns: HashMap<ContentId, usize>,
    },
}

impl ContentIndex {
    pub fn listed(ids: Vec<ContentId>) -> Self {
        let mut columns = HashMap::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            columns.entry(*id).or_insert(i);
        }
        ContentIndex::Listed { ids, columns }
    }

    pub fn content_at(&self, index: usize) -> Option<ContentId> {
        match self {
            ContentIndex::OneBased => Some(index as ContentId + 1),
            ContentIndex::Listed { ids, .. } => ids.get(index).copied(),
        }
    }

    pub fn column_of(&self, content: ContentId) -> Option<usize> {
        match self {
            ContentIndex::OneBased => content.checked_sub(1).map(|c| c as usize),
            ContentIndex::Listed { columns, .. } => columns.get(&content).copied(),
        }
    }
}

/// One oracle snapshot: which node should hold which content from now on, and the placement to
/// seed the caches with when the snapshot is swapped in
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    membership: MembershipMatrix,
    placement: Vec<(NodeId, ContentId)>,
    index: ContentIndex,
}

impl Snapshot {
    pub fn new(membership: MembershipMatrix, placement: Vec<(NodeId, ContentId)>, index: ContentIndex) -> Self {
        Self {
            membership,
            placement,
            index,
        }
    }

    /// Loads a snapshot from its matrix, placement and optional content index files
    pub fn read(matrix: &Path, placement: &Path, contents: Option<&Path>) -> Result<Self, ArtifactError> {
        let membership = MembershipMatrix::read(matrix)?;
        let index = match contents {
            Some(path) => ContentIndex::listed(read_content_list(path)?),
            None => ContentIndex::OneBased,
        };
        let placement = resolve_placement(read_placement(placement)?, &index, placement)?;
        Ok(Self::new(membership, placement, index))
    }

    /// Whether the oracle wants `node` to hold `content`
    pub fn membership(&self, node: NodeId, content: ContentId) -> bool {
        self.index
            .column_of(content)
            .map_or(false, |column| self.membership.is_member(node, column))
    }

    pub fn placement(&self) -> &[(NodeId, ContentId)] {
        &self.placement
    }
}

/// Maps placement indices to content ids
pub fn resolve_placement(
    raw: Vec<(NodeId, usize)>,
    index: &ContentIndex,
    path: &Path,
) -> Result<Vec<(NodeId, ContentId)>, ArtifactError> {
    raw.into_iter()
        .enumerate()
        .map(|(i, (node, idx))| {
            index
                .content_at(idx)
                .map(|content| (node, content))
                .ok_or_else(|| parse_error(path, i + 1, format!("content index {idx} is not in the content list")))
        })
        .collect()
}

/// A source of oracle snapshots, numbered from 0
pub trait SnapshotProvider {
    fn snapshot_count(&self) -> usize;

    fn load(&self, index: usize) -> Result<Snapshot, ArtifactError>;
}

impl SnapshotProvider for Vec<Snapshot> {
    fn snapshot_count(&self) -> usize {
        self.len()
    }

    fn load(&self, index: usize) -> Result<Snapshot, ArtifactError> {
        self.get(index).cloned().ok_or(ArtifactError::MissingSnapshot(index))
    }
}

/// The files making up one snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotFiles {
    pub matrix: PathBuf,
    pub placement: PathBuf,
    pub contents: Option<PathBuf>,
}

pub const MATRIX_FILE: &str = "matrix.csv";
pub const PLACEMENT_FILE: &str = "placement.txt";
pub const CONTENTS_FILE: &str = "contents.txt";

/// Snapshots stored as `part<N>` sub-directories of one root, used in ascending `N` order
#[derive(Debug, Clone)]
pub struct SnapshotDirectory {
    parts: Vec<SnapshotFiles>,
}

impl SnapshotDirectory {
    /// Finds every `part<N>` directory under `root`. Each one must hold a matrix and a placement
    /// file, so a missing file is reported before the run starts rather than at its checkpoint
    pub fn discover(root: &Path) -> Result<Self, ArtifactError> {
        let io_error = |source| ArtifactError::Io {
            path: root.to_path_buf(),
            source,
        };
        let part_pattern = Regex::new(r"^part(?P<index>[0-9]+)$")
            .map_err(|e| parse_error(root, 0, format!("couldn't build the part pattern: {e}")))?;
        let mut parts = Vec::new();
        for entry in fs::read_dir(root).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(tokens) = part_pattern.captures(name) else {
                continue;
            };
            if !entry.path().is_dir() {
                continue;
            }
            let index: u64 = tokens["index"]
                .parse()
                .map_err(|e| parse_error(&entry.path(), 0, format!("invalid part number: {e}")))?;
            let dir = entry.path();
            for required in [MATRIX_FILE, PLACEMENT_FILE] {
                if !dir.join(required).is_file() {
                    return Err(ArtifactError::Io {
                        path: dir.join(required),
                        source: std::io::Error::new(std::io::ErrorKind::NotFound, "snapshot file is missing"),
                    });
                }
            }
            let contents = dir.join(CONTENTS_FILE);
            debug!(part = index, dir = %dir.display(), "found snapshot");
            parts.push((
                index,
                SnapshotFiles {
                    matrix: dir.join(MATRIX_FILE),
                    placement: dir.join(PLACEMENT_FILE),
                    contents: contents.is_file().then_some(contents),
                },
            ));
        }
        if parts.is_empty() {
            return Err(ArtifactError::Empty(root.to_path_buf()));
        }
        parts.sort_by_key(|(index, _)| *index);
        info!(root = %root.display(), snapshots = parts.len(), "discovered oracle snapshots");
        Ok(Self {
            parts: parts.into_iter().map(|(_, files)| files).collect(),
        })
    }

    pub fn parts(&self) -> &[SnapshotFiles] {
        &self.parts
    }
}

impl SnapshotProvider for SnapshotDirectory {
    fn snapshot_count(&self) -> usize {
        self.parts.len()
    }

    fn load(&self, index: usize) -> Result<Snapshot, ArtifactError> {
        let files = self.parts.get(index).ok_or(ArtifactError::MissingSnapshot(index))?;
        Snapshot::read(&files.matrix, &files.placement, files.contents.as_deref())
    }
}
