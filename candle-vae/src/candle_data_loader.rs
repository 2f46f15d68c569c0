use crate::candle_random::RandomSource;
use candle_core::{Device, Tensor};
use table_util::table_io::NamedTable;

pub struct MinibatchData {
    pub input: Tensor,
    /// row indexes into the full table
    pub rows: Vec<usize>,
    /// auxiliary columns of those rows, carried along untouched
    pub aux: Vec<Box<[Box<str>]>>,
}

///
/// An in-memory feature matrix. Each row is one example; `aux` keeps
/// whatever non-numeric columns came with it.
///
pub struct TabularData {
    features: Tensor,
    aux: Vec<Box<[Box<str>]>>,
}

impl TabularData {
    /// * `features` - n x d matrix
    /// * `aux` - one entry per row (or empty for none)
    pub fn new(features: Tensor, aux: Vec<Box<[Box<str>]>>) -> anyhow::Result<Self> {
        let (nrows, _) = features.dims2()?;
        let aux = if aux.is_empty() {
            vec![Box::default(); nrows]
        } else {
            aux
        };
        if aux.len() != nrows {
            return Err(anyhow::anyhow!(
                "{} auxiliary rows for {} feature rows",
                aux.len(),
                nrows
            ));
        }
        Ok(Self { features, aux })
    }

    pub fn from_table(table: NamedTable) -> anyhow::Result<Self> {
        Self::new(table.features, table.aux)
    }

    pub fn num_rows(&self) -> usize {
        self.aux.len()
    }

    pub fn num_columns(&self) -> usize {
        self.features.dims()[1]
    }
}

///
/// Serves a (possibly subsampled) `TabularData` in minibatches; after
/// `shuffle_minibatch` or `sequential_minibatch` is called, the kept
/// rows are partitioned into chunks of `batch_size`.
///
pub struct TabularLoader {
    data: TabularData,
    batch_size: usize,
    samples: Vec<usize>,
    chunks: Vec<Vec<usize>>,
}

impl TabularLoader {
    /// * `data` - the full table
    /// * `batch_size` - maximum number of rows per minibatch
    /// * `sample_fraction` - keep this fraction of rows, in (0, 1]
    /// * `rng` - for choosing the subset
    pub fn new(
        data: TabularData,
        batch_size: usize,
        sample_fraction: f64,
        rng: &mut RandomSource,
    ) -> anyhow::Result<Self> {
        if batch_size == 0 {
            return Err(anyhow::anyhow!("batch size must be positive"));
        }
        if !(sample_fraction > 0.0 && sample_fraction <= 1.0) {
            return Err(anyhow::anyhow!(
                "sample fraction must be in (0, 1], got {}",
                sample_fraction
            ));
        }

        let ntot = data.num_rows();
        if ntot == 0 {
            return Err(anyhow::anyhow!("empty data"));
        }

        let samples = if sample_fraction < 1.0 {
            let nkeep = ((ntot as f64 * sample_fraction).round() as usize).clamp(1, ntot);
            rng.subsample(ntot, nkeep)
        } else {
            (0..ntot).collect()
        };

        let mut ret = Self {
            data,
            batch_size,
            samples,
            chunks: vec![],
        };
        ret.sequential_minibatch();
        Ok(ret)
    }

    /// Randomly partition the kept rows
    pub fn shuffle_minibatch(&mut self, rng: &mut RandomSource) {
        let mut order = self.samples.clone();
        rng.shuffle(&mut order);
        self.chunks = order.chunks(self.batch_size).map(|c| c.to_vec()).collect();
    }

    /// Partition the kept rows in their original order
    pub fn sequential_minibatch(&mut self) {
        self.chunks = self
            .samples
            .chunks(self.batch_size)
            .map(|c| c.to_vec())
            .collect();
    }

    pub fn minibatch_data(&self, batch_idx: usize, target_device: &Device) -> anyhow::Result<MinibatchData> {
        let rows = self.chunks.get(batch_idx).ok_or_else(|| {
            anyhow::anyhow!(
                "invalid index = {} vs. total # = {}",
                batch_idx,
                self.num_minibatch()
            )
        })?;

        let idx = Tensor::from_iter(rows.iter().map(|&i| i as u32), &Device::Cpu)?;
        let input = self
            .data
            .features
            .index_select(&idx, 0)?
            .to_device(target_device)?;

        Ok(MinibatchData {
            input,
            rows: rows.clone(),
            aux: rows.iter().map(|&i| self.data.aux[i].clone()).collect(),
        })
    }

    pub fn num_minibatch(&self) -> usize {
        self.chunks.len()
    }

    /// number of rows kept after subsampling
    pub fn num_rows(&self) -> usize {
        self.samples.len()
    }

    pub fn num_columns(&self) -> usize {
        self.data.num_columns()
    }

    /// Names of `rows`: the first auxiliary column if there is one,
    /// otherwise the row index
    pub fn row_names(&self, rows: &[usize]) -> Vec<Box<str>> {
        rows.iter()
            .map(|&i| match self.data.aux[i].first() {
                Some(name) => name.clone(),
                None => i.to_string().into_boxed_str(),
            })
            .collect()
    }
}
