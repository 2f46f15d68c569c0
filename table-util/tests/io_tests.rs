use candle_core::{Device, Tensor};
use table_util::common_io::{create_temp_dir_file, write_lines};
use table_util::parquet::peek_parquet_shape;
use table_util::table_io::{read_table, TableFormat};
use table_util::traits::IoOps;

#[test]
fn tensor_tsv_io_test() -> anyhow::Result<()> {
    let xx = Tensor::rand(0f32, 1f32, (20, 7), &Device::Cpu)?;

    let tsv_file = create_temp_dir_file(".tsv.gz")?;
    xx.to_tsv(tsv_file.to_str().unwrap())?;

    let yy = Tensor::from_tsv(tsv_file.to_str().unwrap())?;

    let (xx, yy) = (xx.to_vec2::<f32>()?, yy.to_vec2::<f32>()?);
    for (x, y) in xx.iter().flatten().zip(yy.iter().flatten()) {
        approx::assert_abs_diff_eq!(x, y, epsilon = 1e-6);
    }

    Ok(())
}

#[test]
fn tensor_parquet_io_test() -> anyhow::Result<()> {
    let xx = Tensor::rand(0f32, 1f32, (11, 3), &Device::Cpu)?;
    let file = create_temp_dir_file(".parquet")?;
    let cols: Vec<Box<str>> = vec!["a".into(), "b".into(), "c".into()];

    xx.to_parquet(None, Some(&cols), file.to_str().unwrap())?;

    let (nrows, fields) = peek_parquet_shape(file.to_str().unwrap())?;
    assert_eq!(nrows, 11);
    assert_eq!(
        fields.iter().map(|f| f.as_ref()).collect::<Vec<_>>(),
        vec!["row", "a", "b", "c"]
    );
    Ok(())
}

#[test]
fn read_table_with_aux_columns() -> anyhow::Result<()> {
    let file = create_temp_dir_file(".csv")?;
    let lines = vec![
        "# comment line",
        "id,label,f1,f2,f3",
        "r1,A,0.1,0.2,0.3",
        "r2,B,1,2,3",
        "r3,A,-1.5,0,1e-2",
    ];
    write_lines(&lines, file.to_str().unwrap())?;

    let format = TableFormat {
        aux_columns: 2,
        ..TableFormat::default()
    };
    let table = read_table(file.to_str().unwrap(), &format)?;

    assert_eq!(table.num_rows(), 3);
    assert_eq!(table.num_features(), 3);
    assert_eq!(table.features.dims(), &[3, 3]);
    assert_eq!(table.aux_names[1].as_ref(), "label");
    assert_eq!(table.aux[1][0].as_ref(), "r2");
    assert_eq!(table.feature_names[2].as_ref(), "f3");

    let x = table.features.to_vec2::<f32>()?;
    approx::assert_abs_diff_eq!(x[2][2], 0.01, epsilon = 1e-7);
    Ok(())
}

#[test]
fn read_table_rejects_bad_rows() -> anyhow::Result<()> {
    let ragged = create_temp_dir_file(".tsv")?;
    write_lines(&["a\tb", "1\t2", "3"], ragged.to_str().unwrap())?;
    assert!(read_table(ragged.to_str().unwrap(), &TableFormat::default()).is_err());

    let not_numeric = create_temp_dir_file(".tsv")?;
    write_lines(&["a\tb", "1\tfoo"], not_numeric.to_str().unwrap())?;
    let err = read_table(not_numeric.to_str().unwrap(), &TableFormat::default())
        .err()
        .expect("should fail to parse");
    assert!(err.to_string().contains("foo"));

    let all_aux = TableFormat {
        aux_columns: 2,
        ..TableFormat::default()
    };
    let ok_file = create_temp_dir_file(".tsv")?;
    write_lines(&["a\tb", "1\t2"], ok_file.to_str().unwrap())?;
    assert!(read_table(ok_file.to_str().unwrap(), &all_aux).is_err());
    Ok(())
}

#[test]
fn empty_tensor_parquet_io_test() -> anyhow::Result<()> {
    let xx = Tensor::zeros((0, 2), candle_core::DType::F32, &Device::Cpu)?;
    let file = create_temp_dir_file(".parquet")?;
    let rows: Vec<Box<str>> = vec![];
    let cols: Vec<Box<str>> = vec!["z0".into(), "z1".into()];

    xx.to_parquet(Some(&rows), Some(&cols), file.to_str().unwrap())?;

    let (nrows, fields) = peek_parquet_shape(file.to_str().unwrap())?;
    assert_eq!(nrows, 0);
    assert_eq!(fields.len(), 3);
    Ok(())
}
