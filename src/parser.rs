//! Reading input data and exporting signatures
//!
//! All files are tab-delimited text files.
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use tracing::info;

use crate::annotations::GeneAnnotationSet;
use crate::expression::ExpressionMatrix;
use crate::matrix::SignatureMatrix;
use crate::signature::{LabelOptions, Signature};
use crate::{GoPcaError, GoPcaResult};

/// Reads an expression matrix file
///
/// ```text
/// Gene    sample1 sample2 sample3
/// STAT1   7.1     6.8     10.2
/// IRF7    5.3     5.1     8.9
/// ```
///
/// The first column of the header is ignored.
///
/// # Errors
///
/// - [`GoPcaError::Io`] if the file cannot be read
/// - [`GoPcaError::ParseFloat`] for non-numeric values
/// - [`GoPcaError::InvalidInput`] for malformed rows or an invalid matrix
pub fn read_expression<P: AsRef<Path>>(path: P) -> GoPcaResult<ExpressionMatrix> {
    let file = File::open(path.as_ref())?;
    let matrix = parse_expression(BufReader::new(file))?;
    info!(
        "Read {} genes and {} samples from {}",
        matrix.n_genes(),
        matrix.n_samples(),
        path.as_ref().display()
    );
    Ok(matrix)
}

/// Reads a gene set file with GO term annotations
///
/// ```text
/// GO:0045087  innate immune response  STAT1,IRF7,MX1  GO  BP  description
/// ```
///
/// The columns are term id, term name, comma-separated genes, source,
/// domain and description. The last three columns are optional. Empty lines
/// and lines starting with `#` are skipped.
///
/// # Errors
///
/// - [`GoPcaError::Io`] if the file cannot be read
/// - [`GoPcaError::InvalidInput`] for malformed lines or duplicate terms
pub fn read_gene_sets<P: AsRef<Path>>(path: P) -> GoPcaResult<GeneAnnotationSet> {
    let file = File::open(path.as_ref())?;
    let annotations = parse_gene_sets(BufReader::new(file))?;
    info!(
        "Read {} gene sets from {}",
        annotations.len(),
        path.as_ref().display()
    );
    Ok(annotations)
}

/// Parses an expression matrix, see [`read_expression`]
///
/// # Errors
///
/// Same as [`read_expression`]
pub fn parse_expression<R: BufRead>(reader: R) -> GoPcaResult<ExpressionMatrix> {
    expression::parse(reader)
}

/// Parses gene sets, see [`read_gene_sets`]
///
/// # Errors
///
/// Same as [`read_gene_sets`]
pub fn parse_gene_sets<R: BufRead>(reader: R) -> GoPcaResult<GeneAnnotationSet> {
    gene_sets::parse(reader)
}

/// Writes the signature matrix, one row per signature
///
/// ```text
/// Signature                       s1   s2   s3
/// BP: mitosis [1:12/140]          1.2  0.3  1.1
/// ```
///
/// # Errors
///
/// [`GoPcaError::Io`] if writing fails
pub fn write_signature_matrix<W: Write>(
    writer: &mut W,
    matrix: &SignatureMatrix,
    options: &LabelOptions,
) -> GoPcaResult<()> {
    writeln!(writer, "Signature\t{}", matrix.samples().join("\t"))?;
    for (label, row) in matrix.labels(options).iter().zip(matrix.values().rows()) {
        let values: Vec<String> = row.iter().map(f64::to_string).collect();
        writeln!(writer, "{}\t{}", label, values.join("\t"))?;
    }
    info!(
        "Wrote {} signatures for {} samples",
        matrix.len(),
        matrix.samples().len()
    );
    Ok(())
}

/// Writes a summary table of the signatures
///
/// The columns are the fields of [`Signature::summary`]. Nothing is
/// written if `signatures` is empty.
///
/// # Errors
///
/// [`GoPcaError::Io`] if writing fails
pub fn write_signature_table<W: Write>(writer: &mut W, signatures: &[Signature]) -> GoPcaResult<()> {
    let Some(first) = signatures.first() else {
        return Ok(());
    };
    let header: Vec<String> = first.summary().into_iter().map(|(col, _)| col).collect();
    writeln!(writer, "{}", header.join("\t"))?;
    for signature in signatures {
        let row: Vec<String> = signature
            .summary()
            .into_iter()
            .map(|(_, value)| value)
            .collect();
        writeln!(writer, "{}", row.join("\t"))?;
    }
    info!("Wrote summary of {} signatures", signatures.len());
    Ok(())
}

fn content(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

mod expression {
    use super::*;
    use ndarray::Array2;

    pub(super) fn parse<R: BufRead>(reader: R) -> GoPcaResult<ExpressionMatrix> {
        let mut lines = reader.lines();

        let header = lines
            .next()
            .ok_or_else(|| GoPcaError::InvalidInput("expression file is empty".to_string()))??;
        let samples: Vec<String> = content(&header)
            .split('\t')
            .skip(1)
            .map(str::to_string)
            .collect();

        let mut genes = Vec::new();
        let mut data = Vec::new();
        for (line_number, line) in lines.enumerate() {
            let line = line?;
            let line = content(&line);
            if line.is_empty() {
                continue;
            }
            let mut cols = line.split('\t');
            let Some(gene) = cols.next() else {
                continue;
            };
            let mut n_values = 0usize;
            for value in cols {
                data.push(value.trim().parse::<f64>()?);
                n_values += 1;
            }
            if n_values != samples.len() {
                return Err(GoPcaError::InvalidInput(format!(
                    "line {} has {} values for {} samples",
                    line_number + 2,
                    n_values,
                    samples.len()
                )));
            }
            genes.push(gene.to_string());
        }

        let data = Array2::from_shape_vec((genes.len(), samples.len()), data)
            .map_err(|err| GoPcaError::InvalidInput(err.to_string()))?;
        ExpressionMatrix::new(genes, samples, data)
    }
}

mod gene_sets {
    use super::*;
    use crate::annotations::GoTerm;

    pub(super) fn parse<R: BufRead>(reader: R) -> GoPcaResult<GeneAnnotationSet> {
        let mut annotations = GeneAnnotationSet::new();
        for (line_number, line) in reader.lines().enumerate() {
            let line = line?;
            let line = content(&line);
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut cols = line.split('\t');
            let (Some(id), Some(name), Some(genes)) = (cols.next(), cols.next(), cols.next()) else {
                return Err(GoPcaError::InvalidInput(format!(
                    "line {} must contain term id, name and genes",
                    line_number + 1
                )));
            };
            // column 4 is the source of the gene set
            cols.next();
            let domain = cols.next().unwrap_or_default();

            annotations.add_term(
                GoTerm::new(id, name, domain),
                genes.split(',').map(str::trim).filter(|g| !g.is_empty()),
            )?;
        }
        Ok(annotations)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::annotations::GoTerm;
    use crate::enrichment::EnrichmentResult;
    use crate::matrix::SignatureSummary;
    use ndarray::array;

    #[test]
    fn expression_file() {
        let data = "Gene\ts1\ts2\ts3\nSTAT1\t7.1\t6.8\t10.2\r\nIRF7\t5.3\t5.1\t8.9\n\n";
        let matrix = expression::parse(data.as_bytes()).unwrap();
        assert_eq!(matrix.genes(), &["STAT1", "IRF7"]);
        assert_eq!(matrix.samples(), &["s1", "s2", "s3"]);
        assert_eq!(matrix.values()[[1, 2]], 8.9);
    }

    #[test]
    fn malformed_expression_files() {
        assert!(matches!(
            expression::parse("".as_bytes()),
            Err(GoPcaError::InvalidInput(_))
        ));
        assert!(matches!(
            expression::parse("Gene\ts1\ts2\nA\t1.0\n".as_bytes()),
            Err(GoPcaError::InvalidInput(_))
        ));
        assert!(matches!(
            expression::parse("Gene\ts1\nA\tfoo\n".as_bytes()),
            Err(GoPcaError::ParseFloat(_))
        ));
        // duplicate genes are rejected by the matrix
        assert!(expression::parse("Gene\ts1\nA\t1\nA\t2\n".as_bytes()).is_err());
    }

    #[test]
    fn gene_set_file() {
        let data = "# comment\n\
            GO:0045087\tinnate immune response\tSTAT1,IRF7, MX1\tGO\tBP\tdesc\n\
            \n\
            GO:0006412\ttranslation\tRPL3,RPS6\n";
        let annotations = gene_sets::parse(data.as_bytes()).unwrap();
        assert_eq!(annotations.len(), 2);

        let term = annotations.term("GO:0045087").unwrap();
        assert_eq!(term.name(), "innate immune response");
        assert_eq!(term.domain(), "BP");
        let genes: Vec<&str> = annotations
            .genes("GO:0045087")
            .unwrap()
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(genes, vec!["IRF7", "MX1", "STAT1"]);

        assert_eq!(annotations.term("GO:0006412").unwrap().domain(), "");
    }

    #[test]
    fn malformed_gene_set_files() {
        assert!(gene_sets::parse("GO:1\tname\n".as_bytes()).is_err());
        assert!(gene_sets::parse("GO:1\ta\tA\nGO:1\tb\tB\n".as_bytes()).is_err());
    }

    fn signature(id: &str, row: [f64; 3]) -> Signature {
        let enr = EnrichmentResult::new(
            GoTerm::new(id, "cell cycle", "BP"),
            1e-7,
            1e-8,
            Some(4.0),
            1e-4,
            10,
            1,
            8,
            100,
        )
        .unwrap();
        Signature::new(vec![format!("{id}-gene")], array![row], 1, enr).unwrap()
    }

    #[test]
    fn signature_matrix_export() {
        let matrix = SignatureMatrix::from_signatures(
            vec![
                signature("GO:1", [1.0, 2.5, 3.0]),
                signature("GO:2", [0.5, 0.0, -1.0]),
            ],
            vec!["b".to_string(), "a".to_string(), "c".to_string()],
            SignatureSummary::Mean,
        )
        .unwrap();

        let mut out = Vec::new();
        write_signature_matrix(&mut out, &matrix, &LabelOptions::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Signature\tb\ta\tc");
        assert_eq!(lines[1], "BP: cell cycle (GO:1) [1:1/8]\t1\t2.5\t3");
        assert_eq!(lines[2], "BP: cell cycle (GO:2) [1:1/8]\t0.5\t0\t-1");
    }

    #[test]
    fn signature_table_export() {
        let signatures = vec![signature("GO:1", [1.0, 2.5, 3.0])];
        let mut out = Vec::new();
        write_signature_table(&mut out, &signatures).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Label\tPC\tGO Term ID\tk\tK\tP-value"));
        assert!(lines[1].starts_with("BP: cell cycle [1:1/8]\t1\tGO:1\t1\t8\t1.0e-07\t4.0\t"));
        assert!(lines[1].ends_with("\tGO:1-gene"));

        let mut empty = Vec::new();
        write_signature_table(&mut empty, &[]).unwrap();
        assert!(empty.is_empty());
    }
}
