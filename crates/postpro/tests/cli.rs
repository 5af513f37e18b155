use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn postpro() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_postpro"));
    command.env("RUST_LOG", "warn");
    command
}

fn write_quad(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("quad.png");
    let image = image::RgbaImage::from_raw(
        2,
        2,
        vec![
            255, 0, 0, 255, 0, 255, 0, 255, //
            0, 0, 255, 255, 255, 255, 255, 255,
        ],
    )
    .unwrap();
    image.save(&path).unwrap();
    path
}

#[test]
fn effects_lists_the_builtin_catalog() {
    let output = postpro()
        .arg("effects")
        .output()
        .expect("failed to run postpro effects");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("brightness"));
    assert!(stdout.contains("grayscale"));
}

#[test]
fn effects_reads_a_custom_catalog() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog.toml");
    fs::write(
        &path,
        r#"
[[effect]]
id = "posterize"
name = "Posterize"
category = "Custom"

[[effect.params]]
id = "levels"
name = "Levels"
min = 2.0
max = 16.0
initial = 4.0

[[effect.passes]]
shader = "gl_FragColor = vec4(floor(color.rgb * u_levels) / u_levels, color.a);"
inputs = { u_texture = "source" }
output = "final"
"#,
    )
    .unwrap();

    let output = postpro()
        .args(["effects", "--catalog"])
        .arg(&path)
        .output()
        .expect("failed to run postpro effects --catalog");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("Custom\n"));
    assert!(stdout.contains("posterize"));
    assert!(!stdout.contains("brightness"));
}

#[test]
fn invalid_catalog_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[[effect]]\nid = \"\"\nname = \"x\"\ncategory = \"y\"\n").unwrap();

    let output = postpro()
        .args(["effects", "--catalog"])
        .arg(&path)
        .output()
        .expect("failed to run postpro effects --catalog");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load effect catalog"));
}

#[test]
fn export_rejects_unknown_effects_before_touching_the_gpu() {
    let dir = TempDir::new().unwrap();
    let input = write_quad(&dir);
    let out = dir.path().join("out.png");

    let output = postpro()
        .arg("export")
        .arg(&input)
        .args(["--effect", "no-such-effect", "-o"])
        .arg(&out)
        .output()
        .expect("failed to run postpro export");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown effect 'no-such-effect'"));
    assert!(!out.exists());
}

#[test]
fn export_writes_a_png_of_the_same_size() {
    let dir = TempDir::new().unwrap();
    let input = write_quad(&dir);
    let session = dir.path().join("session.toml");
    fs::write(
        &session,
        "time = 1.0\n\n[[effects]]\nid = \"brightness\"\nparams = { amount = 1.5 }\n",
    )
    .unwrap();
    let out = dir.path().join("out.png");

    let output = postpro()
        .arg("export")
        .arg(&input)
        .arg("--session")
        .arg(&session)
        .args(["--effect", "grayscale:amount=0.5", "--software", "-o"])
        .arg(&out)
        .output()
        .expect("failed to run postpro export");
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("no compatible GPU adapter") || stderr.contains("GPU device") {
            eprintln!("No adapter available; skipping export CLI test.");
            return;
        }
        panic!("postpro export failed:\n{stderr}");
    }

    let exported = image::open(&out).unwrap().to_rgba8();
    assert_eq!(exported.dimensions(), (2, 2));
    let red = exported.get_pixel(0, 0).0;
    assert!(red[0] > red[1] && red[1] == red[2], "unexpected pixel {red:?}");
}
