use crate::common_io::{read_lines_of_words_delim, write_lines, Delimiter};
use crate::parquet::ParquetWriter;
use crate::traits::IoOps;
use candle_core::{DType, Device, Tensor};

/// rows of a 2d tensor as `f32` on the host
fn host_rows(mat: &Tensor) -> anyhow::Result<Vec<Vec<f32>>> {
    let dims = mat.dims();
    if dims.len() != 2 {
        return Err(anyhow::anyhow!("expected 2 dimensions, got {}", dims.len()));
    }
    Ok(mat
        .to_device(&Device::Cpu)?
        .to_dtype(DType::F32)?
        .to_vec2::<f32>()?)
}

impl IoOps for Tensor {
    type Mat = Self;

    fn read_file_delim(file: &str, delim: impl Into<Delimiter>) -> anyhow::Result<Self::Mat> {
        let lines = read_lines_of_words_delim(file, delim, false)?.lines;

        if lines.is_empty() {
            return Err(anyhow::anyhow!("No data in file {}", file));
        }

        let ncols = lines[0].len();
        let nrows = lines.len();
        let mut data = Vec::with_capacity(nrows * ncols);

        for (i, words) in lines.iter().enumerate() {
            if words.len() != ncols {
                return Err(anyhow::anyhow!(
                    "{}: row {} has {} columns, expected {}",
                    file,
                    i + 1,
                    words.len(),
                    ncols
                ));
            }
            for w in words {
                data.push(
                    w.parse::<f32>()
                        .map_err(|e| anyhow::anyhow!("{}: row {}: `{}` {}", file, i + 1, w, e))?,
                );
            }
        }

        Ok(Tensor::from_vec(data, (nrows, ncols), &Device::Cpu)?)
    }

    fn write_file_delim(
        &self,
        file: &str,
        delim: &str,
        column_names: Option<&[Box<str>]>,
    ) -> anyhow::Result<()> {
        let rows = host_rows(self)?;

        let mut lines: Vec<Box<str>> = Vec::with_capacity(rows.len() + 1);

        if let Some(names) = column_names {
            lines.push(names.join(delim).into_boxed_str());
        }

        lines.extend(rows.iter().map(|row| {
            row.iter()
                .map(|x| x.to_string())
                .collect::<Vec<_>>()
                .join(delim)
                .into_boxed_str()
        }));

        write_lines(&lines, file)
    }

    fn to_parquet(
        &self,
        row_names: Option<&[Box<str>]>,
        column_names: Option<&[Box<str>]>,
        file_path: &str,
    ) -> anyhow::Result<()> {
        use parquet::data_type::{ByteArrayType, DoubleType};

        let (nrows, ncols) = self.dims2()?;
        let mat = self.to_device(&Device::Cpu)?.to_dtype(DType::F64)?;

        let writer = ParquetWriter::new(file_path, (nrows, ncols), (row_names, column_names))?;

        let mut file_writer = writer.open()?;
        let mut row_group_writer = file_writer.next_row_group()?;

        if let Some(mut column_writer) = row_group_writer.next_column()? {
            column_writer
                .typed::<ByteArrayType>()
                .write_batch(writer.row_names(), None, None)?;
            column_writer.close()?;
        }

        for j in 0..ncols {
            // an empty matrix still gets its (empty) columns
            let data_j = if nrows == 0 {
                vec![]
            } else {
                mat.narrow(1, j, 1)?.flatten_all()?.to_vec1::<f64>()?
            };
            if let Some(mut column_writer) = row_group_writer.next_column()? {
                column_writer
                    .typed::<DoubleType>()
                    .write_batch(&data_j, None, None)?;
                column_writer.close()?;
            }
        }
        row_group_writer.close()?;
        file_writer.close()?;
        Ok(())
    }
}
