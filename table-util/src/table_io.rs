use crate::common_io::{read_lines_of_words_delim, Delimiter};
use candle_core::{Device, Tensor};
use log::info;

/// How to split a delimited table into auxiliary and feature columns
#[derive(Clone, Debug)]
pub struct TableFormat {
    /// number of leading columns kept verbatim (ids, labels, ...)
    pub aux_columns: usize,
    pub has_header: bool,
    /// `None`: decide by the file extension
    pub delim: Option<Delimiter>,
}

impl Default for TableFormat {
    fn default() -> Self {
        Self {
            aux_columns: 0,
            has_header: true,
            delim: None,
        }
    }
}

/// A numeric feature matrix (`n x d`) with the auxiliary columns that
/// came with each row
pub struct NamedTable {
    pub features: Tensor,
    pub feature_names: Vec<Box<str>>,
    pub aux: Vec<Box<[Box<str>]>>,
    pub aux_names: Vec<Box<str>>,
}

impl NamedTable {
    pub fn num_rows(&self) -> usize {
        self.aux.len()
    }

    pub fn num_features(&self) -> usize {
        self.feature_names.len()
    }
}

///
/// Read a delimited (optionally gzipped) table. The first
/// `format.aux_columns` columns of every row are carried as strings;
/// all the remaining columns must be numbers.
///
pub fn read_table(file: &str, format: &TableFormat) -> anyhow::Result<NamedTable> {
    let delim = format
        .delim
        .unwrap_or_else(|| Delimiter::from_file_name(file));

    let out = read_lines_of_words_delim(file, delim, format.has_header)?;

    if out.lines.is_empty() {
        return Err(anyhow::anyhow!("No data in file {}", file));
    }

    let ncols = out.lines[0].len();
    let n_aux = format.aux_columns;

    if n_aux >= ncols {
        return Err(anyhow::anyhow!(
            "{}: {} auxiliary columns leave no feature columns (found {} columns)",
            file,
            n_aux,
            ncols
        ));
    }

    if format.has_header && out.header.len() != ncols {
        return Err(anyhow::anyhow!(
            "{}: header has {} columns, but data rows have {}",
            file,
            out.header.len(),
            ncols
        ));
    }

    let (aux_names, feature_names): (Vec<Box<str>>, Vec<Box<str>>) = if format.has_header {
        (out.header[..n_aux].to_vec(), out.header[n_aux..].to_vec())
    } else {
        (
            (0..n_aux).map(|j| format!("aux{}", j).into_boxed_str()).collect(),
            (0..(ncols - n_aux))
                .map(|j| format!("x{}", j).into_boxed_str())
                .collect(),
        )
    };

    let nrows = out.lines.len();
    let nfeat = ncols - n_aux;
    let mut data = Vec::with_capacity(nrows * nfeat);
    let mut aux = Vec::with_capacity(nrows);

    for (i, words) in out.lines.into_iter().enumerate() {
        if words.len() != ncols {
            return Err(anyhow::anyhow!(
                "{}: row {} has {} columns, expected {}",
                file,
                i + 1,
                words.len(),
                ncols
            ));
        }
        for (j, w) in words[n_aux..].iter().enumerate() {
            let x = w.parse::<f32>().map_err(|e| {
                anyhow::anyhow!(
                    "{}: row {}, column `{}`: cannot parse `{}` ({})",
                    file,
                    i + 1,
                    feature_names[j],
                    w,
                    e
                )
            })?;
            data.push(x);
        }
        let mut words = words;
        words.truncate(n_aux);
        aux.push(words.into_boxed_slice());
    }

    info!("Read {} x {} features from {}", nrows, nfeat, file);

    Ok(NamedTable {
        features: Tensor::from_vec(data, (nrows, nfeat), &Device::Cpu)?,
        feature_names,
        aux,
        aux_names,
    })
}
