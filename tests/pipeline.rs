use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

use gopca::parser;
use gopca::{GoPca, GoPcaConfig, GoPcaRun, LabelOptions, MatrixOrderer};

const TREND: [f64; 6] = [-5.0, -3.0, -1.0, 1.0, 3.0, 5.0];
const CURVE: [f64; 6] = [5.0, -1.0, -4.0, -4.0, -1.0, 5.0];

fn temp_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("gopca-{}-{}", std::process::id(), name))
}

/// 20 genes, 6 samples
///
/// - g1..g5 follow a linear trend
/// - g6..g10 follow a curve that is orthogonal to the trend, with a slight
///   positive or negative tilt
/// - g11..g20 vary slightly
fn expression_file() -> String {
    let mut lines = vec!["Gene\tS1\tS2\tS3\tS4\tS5\tS6".to_string()];
    let scales = [1.0, 0.9, 1.1, 0.8, 1.2];
    for (i, scale) in scales.iter().enumerate() {
        let values: Vec<String> = TREND.iter().map(|v| (5.0 + scale * v).to_string()).collect();
        lines.push(format!("g{}\t{}", i + 1, values.join("\t")));
    }
    let scales = [0.6, 0.5, 0.7, 0.55, 0.65];
    let tilts = [0.05, -0.05, 0.05, -0.05, 0.05];
    for (i, (scale, tilt)) in scales.iter().zip(tilts).enumerate() {
        let values: Vec<String> = CURVE
            .iter()
            .zip(TREND)
            .map(|(c, t)| (5.0 + scale * c + tilt * t).to_string())
            .collect();
        lines.push(format!("g{}\t{}", i + 6, values.join("\t")));
    }
    for g in 0..10usize {
        let values: Vec<String> = (0..6usize)
            .map(|s| (5.0 + 0.1 * ((((g + 11) * (s + 1) * 7) % 5) as f64 - 2.0)).to_string())
            .collect();
        lines.push(format!("g{}\t{}", g + 11, values.join("\t")));
    }
    lines.join("\n") + "\n"
}

fn gene_set_file() -> String {
    [
        "# id\tname\tgenes\tsource\tdomain\tdescription",
        "GO:0000010\tpositive regulation of growth\tg1,g2,g3,g4,g5\tGO\tBP\ttrend",
        "GO:0000020\tinterferon-gamma signaling\tg6,g7,g8,g9,g10\tGO\tBP\tcurve",
        "GO:0000030\tribosome\tg11,g13,g15\tGO\tCC\tnoise",
        "GO:0000040\tunknown genes\tx1,x2,x3\tGO\tMF\toutside of the universe",
    ]
    .join("\n")
}

fn config() -> GoPcaConfig {
    GoPcaConfig {
        n_components: 2,
        pval_thresh: 0.05,
        escore_pval_thresh: 0.05,
        escore_thresh: 1.0,
        min_term_genes: 3,
        max_term_genes: 100,
        mhg_x_frac: 0.0,
        mhg_x_min: 2,
        mhg_l: None,
        max_overlap: 0.5,
        sig_min_genes: 3,
    }
}

#[test]
fn full_pipeline() {
    let expression_path = temp_file("expression.tsv");
    let gene_set_path = temp_file("gene_sets.tsv");
    fs::write(&expression_path, expression_file()).unwrap();
    fs::write(&gene_set_path, gene_set_file()).unwrap();

    let matrix = parser::read_expression(&expression_path).unwrap();
    let annotations = parser::read_gene_sets(&gene_set_path).unwrap();
    assert_eq!(matrix.n_genes(), 20);
    assert_eq!(annotations.len(), 4);

    let run = GoPca::new(config()).run(&matrix, &annotations).unwrap();
    let signatures = run.signatures();

    let trend = signatures
        .iter()
        .find(|sig| sig.term_id() == "GO:0000010")
        .unwrap();
    assert_eq!(trend.pc(), -1);
    assert_eq!(trend.k(), 5);
    assert_eq!(trend.n(), 5);
    assert!(trend.pval() <= 0.05);
    assert!((trend.escore().unwrap() - 4.0).abs() < 1e-12);
    assert!(trend.median_correlation() > 0.99);
    assert_eq!(trend.label(), "BP: pos. regulation of growth [-1:5/5]");

    let curve = signatures
        .iter()
        .find(|sig| sig.term_id() == "GO:0000020")
        .unwrap();
    assert_eq!(curve.pc(), -2);
    assert_eq!(curve.gene_list(), "g10,g6,g7,g8,g9");
    assert_eq!(curve.label(), "BP: IFN-gamma signal. [-2:5/5]");

    // signatures are ordered by PC
    let pcs: Vec<i32> = signatures.iter().map(|sig| sig.pc().abs()).collect();
    let mut sorted = pcs.clone();
    sorted.sort_unstable();
    assert_eq!(pcs, sorted);

    fs::remove_file(&expression_path).unwrap();
    fs::remove_file(&gene_set_path).unwrap();
}

#[test]
fn ordered_export() {
    let matrix = parser::parse_expression(expression_file().as_bytes()).unwrap();
    let annotations = parser::parse_gene_sets(gene_set_file().as_bytes()).unwrap();
    let run = GoPca::new(config()).run(&matrix, &annotations).unwrap();

    let ordered = MatrixOrderer::default().order(run.signature_matrix()).unwrap();
    assert_eq!(ordered, MatrixOrderer::default().order(&ordered).unwrap());

    let matrix_path = temp_file("signature_matrix.tsv");
    {
        let mut writer = BufWriter::new(File::create(&matrix_path).unwrap());
        parser::write_signature_matrix(&mut writer, &ordered, &LabelOptions::default()).unwrap();
    }
    let text = fs::read_to_string(&matrix_path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), ordered.len() + 1);
    assert_eq!(
        lines[0],
        format!("Signature\t{}", ordered.samples().join("\t"))
    );
    for (line, sig) in lines[1..].iter().zip(ordered.signatures()) {
        assert!(line.starts_with(&sig.get_label(&LabelOptions::default())));
        assert_eq!(line.split('\t').count(), 7);
    }
    fs::remove_file(&matrix_path).unwrap();

    let mut table = Vec::new();
    parser::write_signature_table(&mut table, ordered.signatures()).unwrap();
    assert_eq!(
        String::from_utf8(table).unwrap().lines().count(),
        ordered.len() + 1
    );
}

#[test]
fn json_file_round_trip() {
    let matrix = parser::parse_expression(expression_file().as_bytes()).unwrap();
    let annotations = parser::parse_gene_sets(gene_set_file().as_bytes()).unwrap();
    let run = GoPca::new(config()).run(&matrix, &annotations).unwrap();

    let path = temp_file("run.json");
    run.write_json(BufWriter::new(File::create(&path).unwrap()))
        .unwrap();
    let restored = GoPcaRun::read_json(File::open(&path).unwrap()).unwrap();
    assert_eq!(restored, run);
    assert_eq!(restored.config(), &config());
    fs::remove_file(&path).unwrap();
}
