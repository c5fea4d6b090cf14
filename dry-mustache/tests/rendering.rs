use dry_mustache::{
    Boxed, Configuration, ContentType, Context, Error, ParseError, RenderError, Template, TemplateRepository,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn render(src: &str, data: Value) -> String {
    Template::parse(src).unwrap().render(data).unwrap()
}

fn render_in(repository: &TemplateRepository, name: &str, data: Value) -> String {
    repository.template_named(name).unwrap().render(data).unwrap()
}

#[test]
fn rendering_is_deterministic() {
    let template = Template::parse("{{#items}}{{name}}: {{price}}\n{{/items}}").unwrap();
    let data = json!({"items": [{"name": "tea", "price": 2.5}, {"name": "cake", "price": 4}]});
    let first = template.render(data.clone()).unwrap();
    assert_eq!(first, "tea: 2.5\ncake: 4\n");
    assert_eq!(template.render(data).unwrap(), first);
}

#[test]
fn escaping_law() {
    let data = json!({"x": "a<b"});
    assert_eq!(render("{{x}}", data.clone()), "a&lt;b");
    assert_eq!(render("{{{x}}}", data.clone()), "a<b");
    assert_eq!(render("{{&x}}", data), "a<b");
}

#[test]
fn text_templates_never_escape() {
    let configuration = Configuration::default().with_content_type(ContentType::Text);
    let template = TemplateRepository::new()
        .with_configuration(configuration)
        .template_from_str("{{x}}")
        .unwrap();
    assert_eq!(template.content_type(), ContentType::Text);
    assert_eq!(template.render(json!({"x": "<&>"})).unwrap(), "<&>");
}

#[test]
fn section_truthiness() {
    assert_eq!(render("{{#x}}A{{/x}}", json!({"x": []})), "");
    assert_eq!(render("{{#x}}A{{/x}}", json!({"x": [1, 2, 3]})), "AAA");
    assert_eq!(render("{{#x}}{{.}},{{/x}}", json!({"x": ["a", "b"]})), "a,b,");
    assert_eq!(render("{{#x}}{{n}}{{/x}}", json!({"x": [{"n": 1}, {"n": 2}]})), "12");
}

#[test]
fn inversion_law() {
    let values = [
        json!(null),
        json!(false),
        json!(true),
        json!(0),
        json!(1),
        json!(""),
        json!("s"),
        json!({}),
        json!([]),
    ];
    for value in values {
        let data = json!({ "x": value.clone() });
        let normal = render("{{#x}}N{{/x}}", data.clone());
        let inverted = render("{{^x}}I{{/x}}", data);
        assert!(
            (normal == "N") != (inverted == "I"),
            "{:?}: {:?} / {:?}",
            value,
            normal,
            inverted
        );
    }
    let data = json!({"x": [1, 2]});
    assert_eq!(render("{{#x}}N{{/x}}", data.clone()), "NN");
    assert_eq!(render("{{^x}}I{{/x}}", data), "");
    assert_eq!(render("{{^missing}}I{{/missing}}", json!({})), "I");
}

#[test]
fn mismatched_section_tags_are_rejected() {
    let err: ParseError = Template::parse("{{#a}}body{{/b}}").unwrap_err();
    assert_eq!(err.message, "Unmatched closing tag");
    assert_eq!(err.position.column, 11);
}

#[test]
fn unclosed_tags_are_rejected() {
    assert!(Template::parse("{{#a}}body").is_err());
    assert!(Template::parse("{{a").is_err());
    assert!(Template::parse("{{=<% %>").is_err());
}

#[test]
fn block_override() {
    let repository = TemplateRepository::from_map([
        ("parent", "{{$greeting}}Hi{{/greeting}}"),
        ("child", "{{<parent}}{{$greeting}}Hello{{/greeting}}{{/parent}}"),
        ("plain", "{{<parent}}{{/parent}}"),
    ]);
    assert_eq!(render_in(&repository, "child", json!({})), "Hello");
    assert_eq!(render_in(&repository, "plain", json!({})), "Hi");
    assert_eq!(render_in(&repository, "parent", json!({})), "Hi");
}

#[test]
fn blocks_in_sections_are_overridden() {
    let repository = TemplateRepository::from_map([
        ("list", "{{#items}}[{{$item}}{{.}}{{/item}}]{{/items}}"),
        ("stars", "{{<list}}{{$item}}*{{.}}*{{/item}}{{/list}}"),
    ]);
    assert_eq!(render_in(&repository, "list", json!({"items": [1, 2]})), "[1][2]");
    assert_eq!(render_in(&repository, "stars", json!({"items": [1, 2]})), "[*1*][*2*]");
}

#[test]
fn multi_level_inheritance_prefers_the_most_specific_block() {
    let repository = TemplateRepository::from_map([
        ("grandparent", "{{$a}}g{{/a}} {{$b}}g{{/b}} {{$c}}g{{/c}}"),
        ("parent", "{{<grandparent}}{{$a}}p{{/a}}{{$b}}p{{/b}}{{/grandparent}}"),
        ("child", "{{<parent}}{{$a}}c{{/a}}{{/parent}}"),
    ]);
    assert_eq!(render_in(&repository, "parent", json!({})), "p p g");
    assert_eq!(render_in(&repository, "child", json!({})), "c p g");
}

#[test]
fn recursive_inheritance_terminates() {
    let repository = TemplateRepository::from_map([
        ("child", "{{<parent}}{{$foo}}override{{/foo}}{{/parent}}"),
        ("parent", "{{$foo}}default content{{/foo}} {{$bar}}{{<parent2}}{{/parent2}}{{/bar}}"),
        (
            "parent2",
            "{{$foo}}parent2 default content{{/foo}} {{<parent}}{{$bar}}don't recurse{{/bar}}{{/parent}}",
        ),
    ]);
    assert_eq!(
        render_in(&repository, "child", json!({})),
        "override override override don't recurse"
    );
}

#[test]
fn overrides_stop_at_plain_partials() {
    let repository = TemplateRepository::from_map([
        ("page", "{{<layout}}{{$title}}T{{/title}}{{/layout}}"),
        ("layout", "<{{>header}}>"),
        ("header", "{{$title}}default{{/title}}"),
        ("framed", "{{<layout}}{{$title}}T{{/title}}{{/layout}}|{{<header}}{{$title}}T{{/title}}{{/header}}"),
    ]);
    assert_eq!(render_in(&repository, "page", json!({})), "<default>");
    assert_eq!(render_in(&repository, "framed", json!({})), "<default>|T");

    let repository = TemplateRepository::from_map([
        ("page", "{{<layout}}{{$title}}T{{/title}}{{/layout}}"),
        ("layout", "<{{<header}}{{/header}}>"),
        ("header", "{{$title}}default{{/title}}"),
    ]);
    assert_eq!(render_in(&repository, "page", json!({})), "<T>");
}

#[test]
fn partial_inherits_caller_scope() {
    let repository = TemplateRepository::from_map([("main", "{{>p}}"), ("p", "{{x}}")]);
    assert_eq!(render_in(&repository, "main", json!({"x": "v"})), "v");
}

#[test]
fn standalone_partials_leave_no_blank_line() {
    let repository = TemplateRepository::from_map([("main", "a\n  {{>p}}\nb"), ("p", "x\n")]);
    assert_eq!(render_in(&repository, "main", json!({})), "a\nx\nb");
}

#[test]
fn recursive_partials_stop_with_the_data() {
    let repository = TemplateRepository::from_map([(
        "node",
        "{{name}}{{#children}}({{>node}}){{/children}}",
    )]);
    let tree = json!({
        "name": "a",
        "children": [
            {"name": "b", "children": [{"name": "c", "children": []}]},
            {"name": "d", "children": []}
        ]
    });
    assert_eq!(render_in(&repository, "node", tree), "a(b(c))(d)");
}

#[test]
fn missing_partials_fail_when_reached() {
    let template = Template::parse("{{#show}}{{>nowhere}}{{/show}}").unwrap();
    assert_eq!(template.render(json!({"show": false})).unwrap(), "");
    match template.render(json!({"show": true})) {
        Err(Error::NotFound(err)) => assert_eq!(err.name, "nowhere"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn text_partials_are_escaped_in_html_templates() {
    let repository = TemplateRepository::from_map([
        ("page", "<p>{{>note}}</p>"),
        ("note", "{{%CONTENT_TYPE:TEXT}}<{{x}}>"),
        ("text", "{{%CONTENT_TYPE:TEXT}}{{>markup}}"),
        ("markup", "<b>{{x}}</b>"),
    ]);
    assert_eq!(render_in(&repository, "page", json!({"x": "&"})), "<p>&lt;&amp;&gt;</p>");
    assert_eq!(render_in(&repository, "text", json!({"x": "&"})), "<b>&amp;</b>");
}

#[test]
fn delimiter_pragma() {
    assert_eq!(render("{{=<% %>=}}<%x%>", json!({"x": "ok"})), "ok");
    assert_eq!(render("{{=<% %>=}}<%#a%><%x%><%/a%>", json!({"a": {"x": "in"}})), "in");
}

#[test]
fn standalone_tags_leave_no_blank_line() {
    let src = "Begin\n{{#a}}\nInner\n{{/a}}\n{{! note }}\nEnd\n";
    assert_eq!(render(src, json!({"a": true})), "Begin\nInner\nEnd\n");
    assert_eq!(render(src, json!({"a": false})), "Begin\nEnd\n");
}

#[test]
fn nested_contexts() {
    let data = json!({"a": {"b": {"c": 1}}, "c": 0, "d": "outer"});
    assert_eq!(render("{{#a}}{{#b}}{{c}}{{d}}{{/b}}{{/a}}", data.clone()), "1outer");
    assert_eq!(render("{{a.b.c}}", data.clone()), "1");
    assert_eq!(render("{{#a.b}}{{c}}{{/a.b}}", data.clone()), "1");
    assert_eq!(render("[{{a.x.c}}]", data), "[]");
}

#[test]
fn filters() {
    let configuration = Configuration::default()
        .register_key(
            "upper",
            Boxed::filter(|value| Ok(value.to_text().to_uppercase().into())),
        )
        .register_key(
            "join",
            Boxed::variadic_filter(|args| {
                Ok(args.iter().map(Boxed::to_text).collect::<Vec<_>>().join("-").into())
            }),
        );
    let repository = TemplateRepository::new().with_configuration(configuration);
    let template = repository
        .template_from_str("{{upper(name)}} {{join(a, b, c)}} {{join(a)(b)}} {{upper(join(a, b))}}")
        .unwrap();
    let data = json!({"name": "ann", "a": "x", "b": "y", "c": "z"});
    assert_eq!(template.render(data).unwrap(), "ANN x-y-z x-y X-Y");
}

#[test]
fn unary_filters_refuse_extra_arguments() {
    let template = Template::parse("{{upper(a, b)}}")
        .unwrap()
        .register_key("upper", Boxed::filter(|value| Ok(value.to_text().to_uppercase().into())));
    match template.render(json!({"a": "x", "b": "y"})).unwrap_err() {
        Error::Render(RenderError::InTag { tag, source, .. }) => {
            assert_eq!(tag, "{{upper(a, b)}}");
            assert_eq!(*source, RenderError::rejected("Too many arguments"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn missing_filters_abort_rendering() {
    let err = Template::parse("ok\n{{#items}}{{shout(.)}}{{/items}}")
        .unwrap()
        .render(json!({"items": ["a"]}))
        .unwrap_err();
    match err {
        Error::Render(RenderError::InTag {
            tag, position, source, ..
        }) => {
            assert_eq!(tag, "{{shout(.)}}");
            assert_eq!(position.line, 2);
            assert_eq!(*source, RenderError::MissingFilter("shout".to_string()));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn lambdas() {
    let template = Template::parse("{{#wrapped}}{{name}} is awesome.{{/wrapped}} {{planet}}")
        .unwrap()
        .register_key("wrapped", Boxed::lambda(|text| format!("<b>{}</b>", text)))
        .register_key("planet", Boxed::lambda(|_| "{{name}} & co".to_string()));
    assert_eq!(
        template.render(json!({"name": "Willy"})).unwrap(),
        "<b>Willy is awesome.</b> Willy &amp; co"
    );
    assert_eq!(
        template.render(json!({"name": "<Tom & Jerry>"})).unwrap(),
        "<b>&lt;Tom &amp; Jerry&gt; is awesome.</b> &lt;Tom &amp; Jerry&gt; &amp; co"
    );
}

#[test]
fn custom_render_functions_can_iterate() {
    let twice = Boxed::renderer(|info| {
        let once = info.render_inner(info.context())?;
        Ok(dry_mustache::Rendering::new(once.string.repeat(2), once.content_type))
    });
    let template = Template::parse("{{#twice}}<{{x}}>{{/twice}}")
        .unwrap()
        .register_key("twice", twice);
    assert_eq!(template.render(json!({"x": "&"})).unwrap(), "<&amp;><&amp;>");
}

#[test]
fn render_with_explicit_context() {
    let template = Template::parse("{{a}}{{b}}").unwrap();
    let context = Context::new().extend(json!({"a": 1})).extend(json!({"b": 2}));
    let rendering = template.render_with_context(&context).unwrap();
    assert_eq!(rendering.string, "12");
    assert_eq!(rendering.content_type, ContentType::Html);
}

#[test]
fn concurrent_renders_share_templates() {
    let repository = TemplateRepository::from_map([
        ("list", "{{#items}}{{>item}}{{/items}}"),
        ("item", "<{{.}}>"),
    ]);
    let template = repository.template_named("list").unwrap();
    let base = Context::new().extend(json!({"unused": true}));
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let template = &template;
                let base = &base;
                scope.spawn(move || {
                    let context = base.extend(json!({ "items": vec![n; 3] }));
                    template.render_with_context(&context).unwrap().string
                })
            })
            .collect();
        for (n, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), format!("<{0}><{0}><{0}>", n));
        }
    });
}
