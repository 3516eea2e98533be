use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Experimental,
    AlphaFold,
    Boltz,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Experimental, Category::AlphaFold, Category::Boltz];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Experimental => "Experimental",
            Category::AlphaFold => "AlphaFold",
            Category::Boltz => "Boltz",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unrecognized {kind}: '{value}'")]
pub struct ParseCatalogError {
    kind: &'static str,
    value: String,
}

impl FromStr for Category {
    type Err = ParseCatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Experimental" => Ok(Category::Experimental),
            "AlphaFold" | "AF" => Ok(Category::AlphaFold),
            "Boltz" => Ok(Category::Boltz),
            _ => Err(ParseCatalogError {
                kind: "category",
                value: s.to_string(),
            }),
        }
    }
}

/// A Rosetta relaxation protocol, named after its output directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Protocol {
    NormalRef15,
    NormalBeta,
    CartesianRef15,
    CartesianBeta,
    DualspaceRef15,
    DualspaceBeta,
    Custom(String),
}

impl Protocol {
    pub const KNOWN: [Protocol; 6] = [
        Protocol::NormalRef15,
        Protocol::NormalBeta,
        Protocol::CartesianRef15,
        Protocol::CartesianBeta,
        Protocol::DualspaceRef15,
        Protocol::DualspaceBeta,
    ];

    pub fn from_dir_name(name: &str) -> Self {
        match name {
            "normal_ref15" => Protocol::NormalRef15,
            "normal_beta" => Protocol::NormalBeta,
            "cartesian_ref15" => Protocol::CartesianRef15,
            "cartesian_beta" => Protocol::CartesianBeta,
            "dualspace_ref15" => Protocol::DualspaceRef15,
            "dualspace_beta" => Protocol::DualspaceBeta,
            other => Protocol::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Protocol::NormalRef15 => "normal_ref15",
            Protocol::NormalBeta => "normal_beta",
            Protocol::CartesianRef15 => "cartesian_ref15",
            Protocol::CartesianBeta => "cartesian_beta",
            Protocol::DualspaceRef15 => "dualspace_ref15",
            Protocol::DualspaceBeta => "dualspace_beta",
            Protocol::Custom(name) => name,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subcategory {
    Original,
    Raw,
    Relaxed(Protocol),
}

impl Subcategory {
    pub fn is_baseline(&self) -> bool {
        !matches!(self, Subcategory::Relaxed(_))
    }

    pub fn protocol(&self) -> Option<&Protocol> {
        match self {
            Subcategory::Relaxed(protocol) => Some(protocol),
            _ => None,
        }
    }

    /// The unrelaxed subcategory that relaxed structures of `category` are compared against.
    pub fn baseline_for(category: Category) -> Self {
        match category {
            Category::Experimental => Subcategory::Original,
            Category::AlphaFold | Category::Boltz => Subcategory::Raw,
        }
    }
}

impl fmt::Display for Subcategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subcategory::Original => f.write_str("original"),
            Subcategory::Raw => f.write_str("raw"),
            Subcategory::Relaxed(protocol) => write!(f, "relaxed_{}", protocol),
        }
    }
}

impl FromStr for Subcategory {
    type Err = ParseCatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" => Ok(Subcategory::Original),
            "raw" => Ok(Subcategory::Raw),
            _ => match s.strip_prefix("relaxed_") {
                Some(protocol) if !protocol.is_empty() => {
                    Ok(Subcategory::Relaxed(Protocol::from_dir_name(protocol)))
                }
                _ => Err(ParseCatalogError {
                    kind: "subcategory",
                    value: s.to_string(),
                }),
            },
        }
    }
}

/// One structure file found by [`discover`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureEntry {
    pub protein: String,
    pub category: Category,
    pub subcategory: Subcategory,
    pub model: String,
    pub path: PathBuf,
    pub compressed: bool,
}

impl StructureEntry {
    /// Total order used for every table the validation stage writes.
    pub fn cmp_key(&self, other: &Self) -> Ordering {
        self.protein
            .cmp(&other.protein)
            .then(self.category.cmp(&other.category))
            .then_with(|| self.subcategory.cmp(&other.subcategory))
            .then_with(|| natural_cmp(&self.model, &other.model))
    }
}

/// Compares strings with embedded numbers by value, so `r2` sorts before `r10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let mut ln = String::new();
                while let Some(c) = left.next_if(|c| c.is_ascii_digit()) {
                    ln.push(c);
                }
                let mut rn = String::new();
                while let Some(c) = right.next_if(|c| c.is_ascii_digit()) {
                    rn.push(c);
                }
                let lt = ln.trim_start_matches('0');
                let rt = rn.trim_start_matches('0');
                let ord = lt.len().cmp(&rt.len()).then_with(|| lt.cmp(rt));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                left.next();
                right.next();
            }
        }
    }
}

fn sorted_dir_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

fn files_matching(dir: &Path, prefix: &str, suffix: &str) -> io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    Ok(sorted_dir_entries(dir)?
        .into_iter()
        .filter(|p| p.is_file())
        .filter(|p| {
            let name = file_name(p);
            name.len() >= prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix)
        })
        .collect())
}

fn gz_files_recursive(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for path in sorted_dir_entries(dir)? {
        if path.is_dir() {
            gz_files_recursive(&path, out)?;
        } else if file_name(&path).ends_with(".pdb.gz") {
            out.push(path);
        }
    }
    Ok(())
}

fn relaxed_stem(path: &Path) -> String {
    let name = file_name(path);
    name.strip_suffix(".pdb.gz").unwrap_or(name).to_string()
}

/// Model name of a relaxed prediction: the model directory, any subdirectories
/// below the protocol directory, then the file stem, joined by `_`.
fn relaxed_model_name(model_dir: &str, protocol_dir: &Path, path: &Path) -> String {
    let stem = relaxed_stem(path);
    let nested: Vec<String> = path
        .parent()
        .and_then(|parent| parent.strip_prefix(protocol_dir).ok())
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();

    let mut parts = vec![model_dir.to_string()];
    parts.extend(nested);
    let tail = match stem.strip_prefix(model_dir) {
        Some("") => None,
        Some(rest) if rest.starts_with('_') => Some(rest[1..].to_string()),
        _ => Some(stem.clone()),
    };
    parts.extend(tail);
    parts.join("_")
}

fn plain_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string()
}

fn discover_protein(protein_dir: &Path, protein: &str) -> io::Result<Vec<StructureEntry>> {
    let mut entries = Vec::new();
    let mut push = |category, subcategory, model: String, path: PathBuf, compressed| {
        entries.push(StructureEntry {
            protein: protein.to_string(),
            category,
            subcategory,
            model,
            path,
            compressed,
        })
    };

    let experimental = protein_dir.join(format!("{}.pdb", protein));
    if experimental.is_file() {
        push(
            Category::Experimental,
            Subcategory::Original,
            "exp".to_string(),
            experimental,
            false,
        );
    }

    for path in files_matching(&protein_dir.join("AF"), "ranked_", ".pdb")? {
        push(Category::AlphaFold, Subcategory::Raw, plain_stem(&path), path, false);
    }
    for path in files_matching(&protein_dir.join("Boltz"), "boltz_input_model_", ".pdb")? {
        push(Category::Boltz, Subcategory::Raw, plain_stem(&path), path, false);
    }

    for protocol in Protocol::KNOWN {
        let dir = protein_dir.join(protocol.as_str());
        for path in files_matching(&dir, &format!("{}_r", protein), ".pdb.gz")? {
            push(
                Category::Experimental,
                Subcategory::Relaxed(protocol.clone()),
                relaxed_stem(&path),
                path,
                true,
            );
        }
    }

    for (dir_name, category) in [("AF", Category::AlphaFold), ("Boltz", Category::Boltz)] {
        let base = protein_dir.join("relax").join(dir_name);
        if !base.is_dir() {
            continue;
        }
        for model_dir in sorted_dir_entries(&base)?.into_iter().filter(|p| p.is_dir()) {
            let model_name = file_name(&model_dir).to_string();
            for protocol_dir in sorted_dir_entries(&model_dir)?.into_iter().filter(|p| p.is_dir()) {
                let protocol_name = file_name(&protocol_dir);
                if protocol_name == "log" {
                    continue;
                }
                let protocol = Protocol::from_dir_name(protocol_name);
                let mut files = Vec::new();
                gz_files_recursive(&protocol_dir, &mut files)?;
                for path in files {
                    let model = relaxed_model_name(&model_name, &protocol_dir, &path);
                    push(
                        category,
                        Subcategory::Relaxed(protocol.clone()),
                        model,
                        path,
                        true,
                    );
                }
            }
        }
    }

    Ok(entries)
}

/// Enumerates every structure under `root/proteins` by naming convention.
///
/// `proteins` restricts the walk to the given identifiers when non-empty.
/// Entries come back sorted by protein, category, subcategory and model.
pub fn discover(root: &Path, proteins: &[String]) -> io::Result<Vec<StructureEntry>> {
    let proteins_dir = root.join("proteins");
    let mut entries = Vec::new();

    for protein_dir in sorted_dir_entries(&proteins_dir)?.into_iter().filter(|p| p.is_dir()) {
        let protein = file_name(&protein_dir).to_string();
        if !proteins.is_empty() && !proteins.contains(&protein) {
            continue;
        }
        let found = discover_protein(&protein_dir, &protein)?;
        debug!(protein = %protein, structures = found.len(), "Discovered structures.");
        entries.extend(found);
    }

    for requested in proteins {
        if !entries.iter().any(|e| &e.protein == requested) {
            warn!(protein = %requested, "No structures found for requested protein.");
        }
    }

    entries.sort_by(StructureEntry::cmp_key);
    Ok(entries)
}

/// Writes the catalog as CSV with one row per entry.
pub fn write_catalog<W: io::Write>(entries: &[StructureEntry], writer: W) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["protein", "category", "subcategory", "model", "path", "compressed"])?;
    for entry in entries {
        wtr.write_record([
            entry.protein.as_str(),
            entry.category.as_str(),
            &entry.subcategory.to_string(),
            &entry.model,
            &entry.path.to_string_lossy(),
            if entry.compressed { "true" } else { "false" },
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::{MetricRecord, MetricTable, MetricValue};
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "END\n").unwrap();
    }

    fn layout() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "proteins/1ABC/1ABC.pdb");
        touch(root, "proteins/1ABC/AF/ranked_0.pdb");
        touch(root, "proteins/1ABC/AF/ranked_1.pdb");
        touch(root, "proteins/1ABC/AF/features.pkl");
        touch(root, "proteins/1ABC/Boltz/boltz_input_model_0.pdb");
        touch(root, "proteins/1ABC/normal_beta/1ABC_r10.pdb.gz");
        touch(root, "proteins/1ABC/normal_beta/1ABC_r2.pdb.gz");
        touch(root, "proteins/1ABC/cartesian_ref15/1ABC_r1.pdb.gz");
        touch(root, "proteins/1ABC/relax/AF/ranked_0/normal_beta/ranked_0_r1.pdb.gz");
        touch(root, "proteins/1ABC/relax/AF/ranked_0/normal_beta/out/r2.pdb.gz");
        touch(root, "proteins/1ABC/relax/AF/ranked_0/log/ranked_0_r1.pdb.gz");
        touch(root, "proteins/1ABC/relax/Boltz/boltz_input_model_0/fastrelax_test/boltz_input_model_0_r1.pdb.gz");
        touch(root, "proteins/2XYZ/2XYZ.pdb");
        dir
    }

    fn describe(entries: &[StructureEntry]) -> Vec<(String, String, String, String)> {
        entries
            .iter()
            .map(|e| {
                (
                    e.protein.clone(),
                    e.category.to_string(),
                    e.subcategory.to_string(),
                    e.model.clone(),
                )
            })
            .collect()
    }

    #[test]
    fn discovers_all_layouts_in_sorted_order() {
        let dir = layout();
        let entries = discover(dir.path(), &[]).unwrap();
        let got = describe(&entries);
        let expected: Vec<(String, String, String, String)> = [
            ("1ABC", "Experimental", "original", "exp"),
            ("1ABC", "Experimental", "relaxed_normal_beta", "1ABC_r2"),
            ("1ABC", "Experimental", "relaxed_normal_beta", "1ABC_r10"),
            ("1ABC", "Experimental", "relaxed_cartesian_ref15", "1ABC_r1"),
            ("1ABC", "AlphaFold", "raw", "ranked_0"),
            ("1ABC", "AlphaFold", "raw", "ranked_1"),
            ("1ABC", "AlphaFold", "relaxed_normal_beta", "ranked_0_out_r2"),
            ("1ABC", "AlphaFold", "relaxed_normal_beta", "ranked_0_r1"),
            ("1ABC", "Boltz", "raw", "boltz_input_model_0"),
            ("1ABC", "Boltz", "relaxed_fastrelax_test", "boltz_input_model_0_r1"),
            ("2XYZ", "Experimental", "original", "exp"),
        ]
        .iter()
        .map(|(a, b, c, d)| (a.to_string(), b.to_string(), c.to_string(), d.to_string()))
        .collect();
        assert_eq!(got, expected);

        let relaxed = &entries[1];
        assert!(relaxed.compressed);
        assert!(!entries[0].compressed);
    }

    #[test]
    fn protein_filter_restricts_the_walk() {
        let dir = layout();
        let entries = discover(dir.path(), &["2XYZ".to_string()]).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].protein, "2XYZ");
    }

    #[test]
    fn missing_proteins_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover(dir.path(), &[]).is_err());
    }

    #[test]
    fn catalog_csv_has_one_row_per_entry() {
        let dir = layout();
        let entries = discover(dir.path(), &["2XYZ".to_string()]).unwrap();
        let mut buf = Vec::new();
        write_catalog(&entries, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "protein,category,subcategory,model,path,compressed"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("2XYZ,Experimental,original,exp,"));
        assert!(row.ends_with(",false"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn nested_relaxed_files_with_the_same_stem_get_distinct_models() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "proteins/1ABC/relax/AF/ranked_0/normal_beta/r1.pdb.gz");
        touch(root, "proteins/1ABC/relax/AF/ranked_0/normal_beta/rerun/r1.pdb.gz");
        touch(root, "proteins/1ABC/relax/AF/ranked_0/normal_beta/rerun/ranked_0_0001.pdb.gz");

        let entries = discover(root, &[]).unwrap();
        let models: Vec<&str> = entries.iter().map(|e| e.model.as_str()).collect();
        assert_eq!(models, ["ranked_0_r1", "ranked_0_rerun_0001", "ranked_0_rerun_r1"]);

        let records: Vec<MetricRecord> = entries
            .iter()
            .map(|e| {
                let mut record = MetricRecord::keyed(e);
                record.set("clashscore", MetricValue::count(1));
                record
            })
            .collect();
        let table = MetricTable::from_records(&records);
        let joined = MetricTable::join(&[table]);
        assert_eq!(joined.len(), entries.len());
    }

    #[test]
    fn natural_order_compares_embedded_numbers_by_value() {
        assert_eq!(natural_cmp("r2", "r10"), Ordering::Less);
        assert_eq!(natural_cmp("ranked_10", "ranked_9"), Ordering::Greater);
        assert_eq!(natural_cmp("r02", "r2"), Ordering::Equal);
        assert_eq!(natural_cmp("a", "ab"), Ordering::Less);
    }

    #[test]
    fn subcategory_round_trips_through_display() {
        for text in ["original", "raw", "relaxed_dualspace_beta", "relaxed_my_protocol"] {
            let parsed: Subcategory = text.parse().unwrap();
            assert_eq!(parsed.to_string(), text);
        }
        assert!("relaxed_".parse::<Subcategory>().is_err());
        assert!(Subcategory::Relaxed(Protocol::DualspaceBeta) < Subcategory::Relaxed(Protocol::Custom("a".into())));
    }
}
