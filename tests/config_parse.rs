use scan_triage::{
    config::Config,
    metrics::{BorderMode, LaplacianKernel},
};

#[test]
fn parse_example_config() {
    let raw = include_str!("../scan-triage.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.render.dpi, 200);
    assert_eq!(cfg.paths.input_dir, "pdfs");
    assert_eq!(cfg.paths.out_dir, "saida");
    assert_eq!(cfg.metrics.border, BorderMode::Replicate);
    assert_eq!(cfg.metrics.laplacian, LaplacianKernel::FourNeighbor);
}

#[test]
fn partial_sections_keep_defaults() {
    let raw = r#"
        [metrics]
        border = "reflect101"

        [render]
        dpi = 300
    "#;
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.metrics.border, BorderMode::Reflect101);
    assert_eq!(cfg.metrics.laplacian, LaplacianKernel::FourNeighbor);
    assert_eq!(cfg.render.dpi, 300);
    assert_eq!(cfg.render.pdftoppm_exe, "pdftoppm");
    assert!(cfg.output.pretty_json);
}

#[test]
fn unknown_kernel_is_rejected() {
    let raw = "[metrics]\nlaplacian = \"sobel\"\n";
    assert!(toml::from_str::<Config>(raw).is_err());
}
