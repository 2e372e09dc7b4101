use treescope::config;
use treescope::model::tree;
use treescope::view::hierarchy;

fn setup_tracing() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .pretty()
        .with_max_level(tracing::Level::TRACE)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn print_rows(hierarchy: &hierarchy::ViewHierarchy) {
    let config = config::get();
    for row in hierarchy.render() {
        let indent = " ".repeat(config.indent_width * row.depth);
        let color = if row.selected {
            &config.selected_row_text_color
        } else {
            &config.row_text_color
        };
        println!(
            "\x1b[38;2;{};{};{}m{}{} [{}]\x1b[0m",
            color.r, color.g, color.b, indent, row.type_name, row.summary
        );
    }
    println!();
}

fn main() {
    setup_tracing();

    let project = tree::Tree::builder("project")
        .prop("name", "demo session")
        .prop("description", "a small arrangement used for poking at the inspector")
        .child("track", |b| b
            .prop("name", "drums")
            .child("clip", |b| b.prop("name", "fill").prop("length", "4")))
        .child("track", |b| b.prop("name", "bass"))
        .build();

    let mut hierarchy = hierarchy::ViewHierarchy::new();
    hierarchy.set_tree_changed_hook(Some(Box::new(|| {
        tracing::trace!("tree changed");
    })));
    hierarchy.set_root(&project);
    hierarchy.set_expanded(&[0], true);
    print_rows(&hierarchy);

    /* a mutation arriving from outside the display */
    project.child(0).unwrap().add_child(&tree::Tree::new("clip"), None);
    print_rows(&hierarchy);

    hierarchy.select_at(&[1]);
    for field in hierarchy.editor().borrow().fields() {
        println!("{}: {}", field.label, field.text);
    }
    println!();

    if let Err(e) = hierarchy.commit_edit("name", "bass (renamed)") {
        tracing::error!("edit failed: {}", e);
    }
    print_rows(&hierarchy);

    /* swap the whole observed structure out from under the display */
    let arrangement = tree::Tree::builder("arrangement")
        .prop("name", "live set")
        .child("scene", |b| b.prop("name", "intro"))
        .build();
    project.redirect_to(&arrangement);
    print_rows(&hierarchy);
}
