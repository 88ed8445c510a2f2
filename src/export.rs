//! Gene-set (GMT) and BEL namespace (BELNS) writers.

use std::collections::BTreeSet;
use std::io::{self, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Symbols of one pathway, with the pathway's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneSet {
    pub name: String,
    pub identifier: String,
    pub url: String,
    pub symbols: BTreeSet<String>,
}

/// One line per gene set: name, description, then symbols, tab-separated.
/// Empty gene sets are written too, so every pathway is represented.
pub fn write_gene_sets_gmt<W: Write>(writer: &mut W, gene_sets: &[GeneSet]) -> io::Result<()> {
    for gene_set in gene_sets {
        write!(writer, "{}\t{}", gene_set.name, gene_set.url)?;
        for symbol in &gene_set.symbols {
            write!(writer, "\t{symbol}")?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// BEL namespace listing pathway names as biological processes.
pub fn write_bel_namespace<'a, W, I>(
    writer: &mut W,
    names: I,
    created: DateTime<Utc>,
) -> io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a str>,
{
    let names: BTreeSet<&str> = names.into_iter().collect();
    writeln!(writer, "[Namespace]")?;
    writeln!(writer, "Keyword=KEGG")?;
    writeln!(writer, "NameString=KEGG Pathways")?;
    writeln!(writer, "DomainString=BiologicalProcess")?;
    writeln!(writer, "VersionString={}", env!("CARGO_PKG_VERSION"))?;
    writeln!(
        writer,
        "CreatedDateTime={}",
        created.format("%Y-%m-%dT%H:%M:%S")
    )?;
    writeln!(
        writer,
        "DescriptionString=KEGG pathway names, biological process encoding"
    )?;
    writeln!(writer)?;
    writeln!(writer, "[Citation]")?;
    writeln!(writer, "NameString=KEGG")?;
    writeln!(writer, "ReferenceURL=https://www.kegg.jp/kegg/pathway.html")?;
    writeln!(writer)?;
    writeln!(writer, "[Processing]")?;
    writeln!(writer, "CaseSensitiveFlag=yes")?;
    writeln!(writer, "DelimiterString=|")?;
    writeln!(writer, "CacheableFlag=yes")?;
    writeln!(writer)?;
    writeln!(writer, "[Values]")?;
    for name in names {
        writeln!(writer, "{name}|B")?;
    }
    Ok(())
}
