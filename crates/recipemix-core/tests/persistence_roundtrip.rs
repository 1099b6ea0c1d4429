use recipemix_core::{
    MixEngine,
    fingerprint::plan_fingerprint,
    fixtures::demo_recipe,
    persistence::{load_plan, load_recipe, save_plan, save_recipe},
};

#[test]
fn saved_recipes_and_plans_load_back() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let recipe_path = temp.path().join("nested/demo.recipe.json");
    let plan_path = temp.path().join("nested/demo.plan.json");

    let recipe = demo_recipe();
    save_recipe(&recipe_path, &recipe).expect("saving recipe should work");
    assert_eq!(load_recipe(&recipe_path).expect("loading recipe"), recipe);

    let plan = MixEngine::default()
        .plan(&recipe, Some(21))
        .expect("plan should succeed");
    save_plan(&plan_path, &plan).expect("saving plan should work");
    let loaded = load_plan(&plan_path).expect("loading plan");
    assert_eq!(loaded.mix_id, plan.mix_id);
    assert_eq!(loaded.inputs, plan.inputs);
    assert_eq!(
        plan_fingerprint(&loaded.stages, &loaded.inputs, &loaded.final_label),
        plan.fingerprint
    );
}

#[test]
fn saving_replaces_existing_plan_files() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let path = temp.path().join("plan.json");
    let engine = MixEngine::default();

    let first = engine.plan(&demo_recipe(), Some(1)).expect("first plan");
    let second = engine.plan(&demo_recipe(), Some(2)).expect("second plan");
    save_plan(&path, &first).expect("first save");
    save_plan(&path, &second).expect("second save");

    assert_eq!(load_plan(&path).expect("reload").mix_id, second.mix_id);
    let leftovers = std::fs::read_dir(temp.path())
        .expect("read tempdir")
        .count();
    assert_eq!(leftovers, 1);
}

#[test]
fn missing_recipe_files_report_their_path() {
    let err = load_recipe(std::path::Path::new("does/not/exist.json"))
        .expect_err("missing file must fail");
    assert!(format!("{err:#}").contains("does/not/exist.json"));
}
