use tera::Tera;

pub const INDEX: &str = "index.html";

pub fn load() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_template(INDEX, include_str!("../templates/index.html"))?;
    Ok(tera)
}
