use std::fs;

use kegg_pathway_manager::flatfile::{group_fields, tokenize};
use kegg_pathway_manager::parser::{
    COMPOUND_PREFIX, DISEASE_PREFIX, ORTHOLOGY_PREFIX, PATHWAY_PREFIX, Xref, parse_drug,
    parse_gene, parse_pathway_lines, parse_protein_lines,
};

fn fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    fs::read_to_string(path).unwrap()
}

#[test]
fn protein_entry() {
    let text = fixture("hsa_5214.txt");
    let entry = parse_protein_lines(text.lines());

    assert_eq!(entry.identifier.as_deref(), Some("5214"));
    assert_eq!(
        entry.definition.as_deref(),
        Some("(RefSeq) phosphofructokinase, platelet")
    );
    assert_eq!(entry.orthology.len(), 1);
    assert_eq!(entry.orthology[0].prefix, ORTHOLOGY_PREFIX);
    assert_eq!(entry.orthology[0].identifier, "K00850");
    assert_eq!(
        entry.orthology[0].name,
        "6-phosphofructokinase 1 [EC:2.7.1.11]"
    );
    assert_eq!(entry.species.as_ref().unwrap().name, "Homo sapiens");

    let pathways: Vec<&str> = entry
        .pathways
        .iter()
        .map(|xref| xref.identifier.as_str())
        .collect();
    assert_eq!(pathways.len(), 7);
    assert_eq!(&pathways[..2], ["hsa00010", "hsa00030"]);
    assert!(entry.pathways.iter().all(|xref| xref.prefix == PATHWAY_PREFIX));
    assert_eq!(entry.pathways[1].name, "Pentose phosphate pathway");

    assert_eq!(
        entry.motifs,
        vec![Xref {
            prefix: "pfam".to_string(),
            identifier: "PFK".to_string(),
        }]
    );
    assert_eq!(entry.xrefs.len(), 7);
    assert_eq!(entry.xrefs_with_prefix("ncbigene").collect::<Vec<_>>(), ["5214"]);
    assert_eq!(entry.xrefs_with_prefix("mim").collect::<Vec<_>>(), ["171840"]);
    assert_eq!(entry.xrefs_with_prefix("hgnc").collect::<Vec<_>>(), ["8878"]);
    assert_eq!(
        entry.xrefs_with_prefix("uniprot").collect::<Vec<_>>(),
        ["Q01813", "A0A024R0Y4"]
    );
}

#[test]
fn pathway_entry() {
    let text = fixture("hsa00030.txt");
    let entry = parse_pathway_lines(text.lines());

    assert_eq!(entry.identifier.as_deref(), Some("hsa00030"));
    assert_eq!(
        entry.name.as_deref(),
        Some("Pentose phosphate pathway - Homo sapiens (human)")
    );
    assert!(
        entry
            .definition
            .as_deref()
            .unwrap()
            .starts_with("The pentose phosphate pathway")
    );
    assert_eq!(entry.species.as_ref().unwrap().name, "Homo sapiens");

    // the drug line without a class note is dropped
    assert_eq!(entry.drugs.len(), 1);
    assert_eq!(entry.drugs[0].identifier, "D00123");
    assert_eq!(entry.drugs[0].name, "Cyanocobalamin");
    assert_eq!(entry.drugs[0].notes, ["DG00178", "DG01497"]);

    assert_eq!(entry.diseases.len(), 2);
    assert!(entry.diseases.iter().all(|xref| xref.prefix == DISEASE_PREFIX));
    assert_eq!(entry.xrefs[0].prefix, "GO");

    assert_eq!(entry.genes.len(), 7);
    let g6pd = &entry.genes[1];
    assert_eq!(g6pd.identifier, "2539");
    assert_eq!(g6pd.symbol, "G6PD");
    assert_eq!(g6pd.definition, "glucose-6-phosphate dehydrogenase");
    assert_eq!(g6pd.orthologies[0].identifier, "K00036");
    assert_eq!(
        g6pd.enzyme_classes
            .iter()
            .map(|xref| xref.identifier.as_str())
            .collect::<Vec<_>>(),
        ["1.1.1.49", "1.1.1.363"]
    );
    let idnk = entry.genes.iter().find(|gene| gene.symbol == "IDNK").unwrap();
    assert!(idnk.enzyme_classes.is_empty());

    assert_eq!(entry.compounds.len(), 3);
    assert!(entry.compounds.iter().all(|xref| xref.prefix == COMPOUND_PREFIX));

    // the reference without a PMID is ignored
    let references: Vec<&str> = entry
        .references
        .iter()
        .map(|reference| reference.pubmed_id.as_str())
        .collect();
    assert_eq!(references, ["12700258", "12058067"]);

    // the single-spaced related pathway line is dropped
    assert_eq!(entry.related.len(), 3);
    assert_eq!(entry.related[0].identifier, "hsa00010");
}

#[test]
fn subfields_and_continuations_are_grouped() {
    let text = fixture("hsa00030.txt");
    let groups = group_fields(tokenize(text.lines()));
    let journal = groups
        .iter()
        .find(|group| {
            group.field.key == "REFERENCE" && group.field.subkey.as_deref() == Some("JOURNAL")
        })
        .unwrap();
    assert_eq!(
        journal.values,
        [
            "Curr Opin Plant Biol 6:236-46 (2003)",
            "DOI:10.1016/S1369-5266(03)00039-6"
        ]
    );
    let references = groups
        .iter()
        .filter(|group| group.field.is("REFERENCE"))
        .count();
    assert_eq!(references, 3);
}

#[test]
fn unknown_tags_are_skipped() {
    let lines = [
        "ENTRY       1234              CDS       T01001",
        "FOOBAR      anything at all",
        "            more of it",
        "DEFINITION  something",
        "///",
    ];
    let entry = parse_protein_lines(lines);
    assert_eq!(entry.identifier.as_deref(), Some("1234"));
    assert_eq!(entry.definition.as_deref(), Some("something"));
    assert!(entry.xrefs.is_empty());
}

#[test]
fn malformed_lines_do_not_abort_the_entry() {
    let lines = [
        "ENTRY       hsa00030                    Pathway",
        "GENE        not a gene line",
        "            5226  PGD; phosphogluconate dehydrogenase [KO:K00033] [EC:1.1.1.44]",
        "DRUG        D00001  Water",
        "ORGANISM    Homo sapiens",
        "///",
    ];
    let entry = parse_pathway_lines(lines);
    assert_eq!(entry.genes.len(), 1);
    assert_eq!(entry.genes[0].symbol, "PGD");
    assert!(entry.drugs.is_empty());
    assert!(entry.species.is_none());
}

#[test]
fn drug_and_gene_grammar() {
    assert!(parse_drug("D00001  Water").is_none());
    let drug = parse_drug("D00002  Nadide (DG01491)").unwrap();
    assert_eq!(drug.notes, ["DG01491"]);

    assert!(parse_gene("5226 PGD phosphogluconate dehydrogenase").is_none());
    let gene = parse_gene("7167  TPI1; triosephosphate isomerase 1 [KO:K01803] [EC:5.3.1.1]")
        .unwrap();
    assert_eq!(gene.symbol, "TPI1");
    assert_eq!(gene.enzyme_classes[0].identifier, "5.3.1.1");
}

#[test]
fn dblinks_keep_source_order() {
    let text = fixture("hsa_5214.txt");
    let entry = parse_protein_lines(text.lines());
    let pairs: Vec<(&str, &str)> = entry
        .xrefs
        .iter()
        .map(|xref| (xref.prefix.as_str(), xref.identifier.as_str()))
        .collect();
    assert_eq!(
        pairs,
        [
            ("ncbigene", "5214"),
            ("ncbiprotein", "NP_002618"),
            ("mim", "171840"),
            ("hgnc", "8878"),
            ("ensembl", "ENSG00000067057"),
            ("uniprot", "Q01813"),
            ("uniprot", "A0A024R0Y4"),
        ]
    );
}

#[test]
fn gene_organism_line_drops_the_code() {
    let lines = [
        "ENTRY       7167              CDS       T01001",
        "ORGANISM    hsa  Homo sapiens (human)",
        "///",
    ];
    let entry = parse_protein_lines(lines);
    assert_eq!(entry.species.unwrap().name, "Homo sapiens");
}
