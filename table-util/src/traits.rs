use crate::common_io::Delimiter;

/// Read and write matrices from and to files
pub trait IoOps {
    type Mat;

    /// Read a headerless numeric matrix
    fn read_file_delim(file: &str, delim: impl Into<Delimiter>) -> anyhow::Result<Self::Mat>;

    fn from_tsv(tsv_file: &str) -> anyhow::Result<Self::Mat> {
        Self::read_file_delim(tsv_file, '\t')
    }

    /// Write rows with an optional header line
    fn write_file_delim(
        &self,
        file: &str,
        delim: &str,
        column_names: Option<&[Box<str>]>,
    ) -> anyhow::Result<()>;

    fn to_tsv(&self, tsv_file: &str) -> anyhow::Result<()> {
        self.write_file_delim(tsv_file, "\t", None)
    }

    /// Write a matrix as a parquet table; the first column `row`
    /// holds `row_names` (or `0..n` if `None`).
    fn to_parquet(
        &self,
        row_names: Option<&[Box<str>]>,
        column_names: Option<&[Box<str>]>,
        file_path: &str,
    ) -> anyhow::Result<()>;

    /// Pick parquet or delimited text by the file extension
    fn to_file(
        &self,
        row_names: Option<&[Box<str>]>,
        column_names: Option<&[Box<str>]>,
        file_path: &str,
    ) -> anyhow::Result<()> {
        match crate::common_io::file_ext(file_path).as_ref() {
            "parquet" | "pq" => self.to_parquet(row_names, column_names, file_path),
            "csv" => self.write_file_delim(file_path, ",", column_names),
            _ => self.write_file_delim(file_path, "\t", column_names),
        }
    }
}
