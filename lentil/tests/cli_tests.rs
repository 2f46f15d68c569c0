use std::path::Path;
use std::process::Command;

fn write_table(file: &Path, nrows: usize, ncols: usize) -> anyhow::Result<()> {
    let mut lines = vec![std::iter::once("id".to_string())
        .chain((0..ncols).map(|j| format!("f{}", j)))
        .collect::<Vec<_>>()
        .join("\t")];
    for i in 0..nrows {
        let row = (0..ncols)
            .map(|j| format!("{:.3}", ((i * 7 + j * 3) % 11) as f32 / 10.0))
            .collect::<Vec<_>>();
        lines.push(format!("r{}\t{}", i, row.join("\t")));
    }
    std::fs::write(file, lines.join("\n") + "\n")?;
    Ok(())
}

fn lentil() -> Command {
    Command::new(env!("CARGO_BIN_EXE_lentil"))
}

#[test]
fn latent_dim_larger_than_columns_fails() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let train = dir.path().join("train.tsv");
    let test = dir.path().join("test.tsv");
    write_table(&train, 12, 5)?;
    write_table(&test, 4, 5)?;

    let out = dir.path().join("run");
    let output = lentil()
        .arg("fit")
        .arg(&train)
        .arg(&test)
        .args(["--aux-columns", "1", "--latent-dim", "10", "--epochs", "2", "--seed", "1"])
        .arg("--out")
        .arg(&out)
        .output()?;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Latent dimension cannot be greater than the number of columns in the dataset."));

    let leftovers = std::fs::read_dir(dir.path())?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".safetensors"))
        .count();
    assert_eq!(leftovers, 0);
    Ok(())
}

#[test]
fn fit_then_generate() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let train = dir.path().join("train.tsv");
    let test = dir.path().join("test.tsv");
    write_table(&train, 20, 4)?;
    write_table(&test, 6, 4)?;

    let out = dir.path().join("run");
    let status = lentil()
        .arg("fit")
        .arg(&train)
        .arg(&test)
        .args([
            "--aux-columns", "1", "--latent-dim", "2", "--hidden-dim", "4", "--batch-size", "8",
            "--epochs", "1", "--seed", "7",
        ])
        .arg("--out")
        .arg(&out)
        .status()?;
    assert!(status.success());

    let prefix = format!("{}_s1.0_b1.0_lr0.001_ld2_hd4_bs8_epo1", out.display());
    for ext in ["safetensors", "config.json", "scores.parquet", "latent.parquet"] {
        let file = format!("{}.{}", prefix, ext);
        assert!(Path::new(&file).is_file(), "missing {}", file);
    }

    let config = std::fs::read_to_string(format!("{}.config.json", prefix))?;
    assert!(config.contains("\"n_features\": 4"));
    assert!(config.contains("\"f3\""));

    let generated = dir.path().join("gen.tsv");
    let status = lentil()
        .arg("generate")
        .arg(&prefix)
        .args(["-n", "5", "--seed", "3"])
        .arg("--out")
        .arg(&generated)
        .status()?;
    assert!(status.success());

    let text = std::fs::read_to_string(&generated)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "f0\tf1\tf2\tf3");
    assert_eq!(lines[1].split('\t').count(), 4);
    Ok(())
}

#[test]
fn zero_epochs_fails_cleanly() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let train = dir.path().join("train.tsv");
    let test = dir.path().join("test.tsv");
    write_table(&train, 8, 3)?;
    write_table(&test, 4, 3)?;

    let output = lentil()
        .arg("fit")
        .arg(&train)
        .arg(&test)
        .args(["--aux-columns", "1", "--epochs", "0", "--seed", "1"])
        .arg("--out")
        .arg(dir.path().join("run"))
        .output()?;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("number of epochs must be positive"));
    assert!(!stderr.contains("panicked"));
    Ok(())
}
