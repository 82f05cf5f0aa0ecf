use std::fs;

use stanza_text::{extract_lines, scan_dir};

#[test]
fn scans_nested_text_poems() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir_all(root.path().join("nuits")).unwrap();
    fs::write(
        root.path().join("nuits").join("Chanson d'Automne.txt"),
        "Chanson d'automne\n\nLes sanglots longs\nDes violons\n",
    )
    .unwrap();
    fs::write(root.path().join("011.TXT"), "Un seul vers\n").unwrap();
    fs::write(root.path().join("index.txt"), "table des matières\n").unwrap();
    fs::write(root.path().join("vide.txt"), "\n \n").unwrap();
    fs::write(root.path().join("notes.md"), "# pas un poème\n").unwrap();

    let poems = scan_dir(root.path()).unwrap();
    let slugs: Vec<_> = poems.iter().map(|p| p.slug.as_str()).collect();
    assert_eq!(slugs, vec!["011", "chanson-d-automne"]);

    let autumn = &poems[1];
    assert_eq!(autumn.title, "Chanson d'automne");
    assert_eq!(autumn.category.as_deref(), Some("nuits"));
    assert_eq!(
        extract_lines(&autumn.markup),
        vec!["Chanson d'automne", "", "Les sanglots longs", "Des violons"]
    );
    assert_eq!(poems[0].category, None);
}

#[test]
fn scans_saved_poem_pages() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir_all(root.path().join("nuits")).unwrap();
    fs::write(
        root.path().join("nuits").join("La Nuit.HTML"),
        "<html><head><title>Poésie - La Nuit</title></head><body>\n\
         <p><a href=\"10.html\">Précédent</a> | <a href=\"12.html\">Suivant</a></p>\n\
         <h1>La Nuit</h1>\n\
         <p>court<br>bref</p>\n\
         <p>La Nuit<br>\n  Les   &eacute;toiles   &eacute;teintes<br>\n\
         <br>\n Le ciel noir <br>\n &copy; Anna Livebardon</p>\n\
         </body></html>",
    )
    .unwrap();
    fs::write(
        root.path().join("sans-retours.html"),
        "<html><body>\n<p><b>Matin</b></p>\nLe jour se l&egrave;ve\nPrevious page\n</body></html>",
    )
    .unwrap();
    fs::write(root.path().join("vide.html"), "<html><body> </body></html>").unwrap();
    fs::write(root.path().join("index.html"), "<p>a<br>b</p>").unwrap();

    let poems = scan_dir(root.path()).unwrap();
    let slugs: Vec<_> = poems.iter().map(|p| p.slug.as_str()).collect();
    assert_eq!(slugs, vec!["la-nuit", "sans-retours"]);

    let night = &poems[0];
    assert_eq!(night.title, "La Nuit");
    assert_eq!(night.category.as_deref(), Some("nuits"));
    assert_eq!(
        night.markup,
        "<p>Les étoiles éteintes</p><p>Le ciel noir</p>"
    );

    let morning = &poems[1];
    assert_eq!(morning.title, "Matin");
    assert_eq!(morning.category, None);
    assert_eq!(extract_lines(&morning.markup), vec!["Le jour se lève"]);
}

#[test]
fn missing_root_is_an_error() {
    let root = tempfile::tempdir().unwrap();
    let missing = root.path().join("absent");
    let err = scan_dir(&missing).unwrap_err();
    assert!(err.to_string().contains("absent"));
}
